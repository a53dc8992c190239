//! Marker classification for instrument console lines
//!
//! Classifies one logical line into a protocol token. Markers are matched by
//! substring containment because the firmware decorates them with separator
//! art and emoji. Precedence: measurement markers, then block markers, then
//! data patterns, then passthrough.

use crate::core::protocol;
use regex::Regex;

/// Classification of a single console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// A new measurement cycle is starting.
    MeasurementStart,
    /// The current measurement cycle completed.
    MeasurementEnd,
    /// Raw hex dump section opens.
    HexStart,
    /// Raw hex dump section closes.
    HexEnd,
    /// Pixel/intensity CSV section opens.
    CsvStart,
    /// Pixel/intensity CSV section closes.
    CsvEnd,
    /// SD card data section opens.
    SdStart,
    /// SD card data section closes.
    SdEnd,
    /// Whitespace-separated two-digit hex byte tokens.
    HexData,
    /// A `pixel,intensity` integer pair.
    CsvData,
    /// The literal `Pixel,Intensity` header line.
    CsvHeader,
    /// Anything else; passed through to the operator.
    Other,
}

/// Line classifier with pre-compiled data patterns.
pub struct Classifier {
    hex_line: Regex,
    csv_row: Regex,
}

impl Classifier {
    /// Create a classifier.
    pub fn new() -> Self {
        Self {
            // Two-hex-digit byte tokens separated by whitespace.
            hex_line: Regex::new(r"^[0-9A-Fa-f]{2}(?:\s+[0-9A-Fa-f]{2})*$").unwrap(),
            // Decimal pair; sign permitted on the second field only.
            csv_row: Regex::new(r"^\d+,-?\d+$").unwrap(),
        }
    }

    /// Classify one logical line.
    ///
    /// Marker detection always takes precedence over data-pattern matching:
    /// a marker line that happens to also parse as data is still a marker.
    pub fn classify(&self, line: &str) -> LineClass {
        let line = line.trim();
        if line.is_empty() {
            return LineClass::Other;
        }

        if line.contains(protocol::MEASUREMENT_START) {
            return LineClass::MeasurementStart;
        }
        if line.contains(protocol::MEASUREMENT_END) {
            return LineClass::MeasurementEnd;
        }
        if line.contains(protocol::HEX_START) {
            return LineClass::HexStart;
        }
        if line.contains(protocol::HEX_END) {
            return LineClass::HexEnd;
        }
        if line.contains(protocol::CSV_START) {
            return LineClass::CsvStart;
        }
        if line.contains(protocol::CSV_END) {
            return LineClass::CsvEnd;
        }

        // SD markers are case-insensitive; check the end marker first since
        // "END SD DATA" also satisfies the open condition.
        let upper = line.to_ascii_uppercase();
        if upper.contains(protocol::SD_END) {
            return LineClass::SdEnd;
        }
        if upper.contains("SD") && upper.contains("DATA") {
            return LineClass::SdStart;
        }

        if line == protocol::CSV_HEADER {
            return LineClass::CsvHeader;
        }
        if self.hex_line.is_match(line) {
            return LineClass::HexData;
        }
        if self.csv_row.is_match(line) {
            return LineClass::CsvData;
        }

        LineClass::Other
    }

    /// Parse a line already classified as [`LineClass::CsvData`].
    pub fn parse_csv_row(line: &str) -> Option<(u32, i32)> {
        let (pixel, intensity) = line.trim().split_once(',')?;
        Some((pixel.parse().ok()?, intensity.parse().ok()?))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
