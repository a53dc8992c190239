//! Wire protocol constants for the instrument console
//!
//! The payload firmware announces state transitions with plain-text markers
//! embedded in its console output. Markers may carry decorative prefixes, so
//! they are matched by substring containment, never by full-line equality.

/// Marker opening a measurement cycle.
pub const MEASUREMENT_START: &str = "Starting Measurement";

/// Marker closing a measurement cycle.
pub const MEASUREMENT_END: &str = "Measurement Complete";

/// Marker opening the raw hex dump of a measurement.
pub const HEX_START: &str = "Reading full 4106-byte measurement";

/// Marker closing the raw hex dump.
pub const HEX_END: &str = "Full 4106 bytes received";

/// Marker opening the pixel/intensity CSV block.
pub const CSV_START: &str = "CSV DATA OUTPUT:";

/// Marker closing the pixel/intensity CSV block.
pub const CSV_END: &str = "END CSV DATA";

/// Marker closing an SD card data block (matched case-insensitively).
pub const SD_END: &str = "END SD";

/// Header line emitted at the top of every CSV block; skipped as data.
pub const CSV_HEADER: &str = "Pixel,Intensity";

/// Size of one complete raw measurement in bytes (10-byte header plus
/// 2048 little-endian 16-bit pixels).
pub const MEASUREMENT_BYTES: usize = 4106;

/// Bytes per line in the firmware's hex dump output.
pub const HEX_BYTES_PER_LINE: usize = 16;

/// Expected hex dump lines per measurement.
pub const HEX_LINES_PER_MEASUREMENT: usize =
    MEASUREMENT_BYTES.div_ceil(HEX_BYTES_PER_LINE);

/// Detector pixel count, and therefore expected CSV rows per measurement.
pub const CSV_ROWS_PER_MEASUREMENT: usize = 2048;

/// Sentinel written before a raw capture's body.
pub const CAPTURE_SENTINEL_START: &str = "===VIA START===";

/// Sentinel written after a raw capture's body.
pub const CAPTURE_SENTINEL_STOP: &str = "===VIA STOP===";

// File transfer sub-protocol (half-duplex request/response).

/// Command requesting the SD card file listing.
pub const CMD_LIST_FILES: &str = "LIST_FILES";

/// Command requesting a file download; takes a filename argument.
pub const CMD_GET_FILE: &str = "GET_FILE";

/// Response marker opening a file listing.
pub const LIST_START: &str = "LIST_START";

/// Response marker closing a file listing.
pub const LIST_END: &str = "LIST_END";

/// Response marker opening a file download.
pub const FILE_START: &str = "FILE_START";

/// Response marker closing a file download.
pub const FILE_END: &str = "FILE_END";

/// Prefix of an error response; aborts the pending operation.
pub const ERROR_PREFIX: &str = "ERROR";

// Radio downlink framing.

/// Text header prefix announcing a radio frame: `VIA:<size>:`.
pub const RADIO_HEADER_PREFIX: &str = "VIA:";

/// Byte sequence terminating a radio frame's payload.
pub const RADIO_DELIMITER: &[u8] = b":END";
