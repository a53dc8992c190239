//! Hex formatting and decoding helpers
//!
//! The instrument and the radio downlink both speak uppercase, 16-byte-wide
//! hex dumps; the transfer protocol sends payloads as whitespace-separated
//! hex digit lines.

use crate::core::protocol::HEX_BYTES_PER_LINE;

/// Format bytes as uppercase space-separated hex dump lines.
pub fn hex_dump_lines(data: &[u8], bytes_per_line: usize) -> Vec<String> {
    data.chunks(bytes_per_line.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Format bytes with the instrument's standard 16-byte row width.
pub fn hex_dump(data: &[u8]) -> Vec<String> {
    hex_dump_lines(data, HEX_BYTES_PER_LINE)
}

/// Strip whitespace from accumulated hex text and decode it to bytes.
///
/// An odd digit count or a non-hex character is a decode failure; callers
/// treat that as fatal for the current transfer only.
pub fn decode_hex_payload(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump_lines() {
        let data: Vec<u8> = (0u8..20).collect();
        let lines = hex_dump(&data);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F"
        );
        assert_eq!(lines[1], "10 11 12 13");
    }

    #[test]
    fn test_decode_roundtrip() {
        for len in [0usize, 1, 4106] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let text = hex_dump(&data).join("\n");
            assert_eq!(decode_hex_payload(&text).unwrap(), data);
        }
    }

    #[test]
    fn test_decode_odd_length_fails() {
        assert!(decode_hex_payload("ABC").is_err());
    }

    #[test]
    fn test_decode_invalid_digit_fails() {
        assert!(decode_hex_payload("ZZ").is_err());
    }
}
