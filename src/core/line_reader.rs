//! Incremental line reassembly over arbitrarily chunked reads
//!
//! Serial reads arrive with unpredictable chunking: a logical line may span
//! several reads, and one read may carry many lines. `LineReassembler`
//! buffers the unterminated suffix across reads and yields complete lines.
//!
//! Two terminator modes exist. The session engine splits on `\n` only
//! (stripping a trailing `\r`), while the radio path treats `\r` and `\n`
//! both as terminators because the downlink is not strictly line-oriented.

/// Line terminator handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    /// `\n` terminates a line; a trailing `\r` is stripped from the line.
    #[default]
    Newline,
    /// Either `\r` or `\n` terminates a line; a `\r\n` pair counts once.
    CrOrLf,
}

/// Reassembles logical lines from a stream of byte chunks.
#[derive(Debug, Default)]
pub struct LineReassembler {
    buf: Vec<u8>,
    terminator: LineTerminator,
}

impl LineReassembler {
    /// Create a reassembler splitting on `\n`.
    pub fn new() -> Self {
        Self::with_terminator(LineTerminator::Newline)
    }

    /// Create a reassembler with an explicit terminator mode.
    pub fn with_terminator(terminator: LineTerminator) -> Self {
        Self {
            buf: Vec::new(),
            terminator,
        }
    }

    /// Append a chunk without extracting lines.
    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Append a chunk and return every complete line it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.push_bytes(chunk);
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        lines
    }

    /// Pop the next complete line, if one is buffered.
    ///
    /// Returns `None` when the buffer holds only an unterminated fragment.
    /// In `CrOrLf` mode a `\r` at the very end of the buffer is held back
    /// until the next chunk decides whether it is half of a `\r\n` pair.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = match self.terminator {
            LineTerminator::Newline => self.buf.iter().position(|&b| b == b'\n')?,
            LineTerminator::CrOrLf => {
                let pos = self.buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
                if self.buf[pos] == b'\r' && pos + 1 == self.buf.len() {
                    return None;
                }
                pos
            }
        };

        let mut end = pos;
        let mut consumed = pos + 1;
        match self.terminator {
            LineTerminator::Newline => {
                if end > 0 && self.buf[end - 1] == b'\r' {
                    end -= 1;
                }
            }
            LineTerminator::CrOrLf => {
                if self.buf[pos] == b'\r' && self.buf.get(pos + 1) == Some(&b'\n') {
                    consumed += 1;
                }
            }
        }

        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.drain(..consumed);
        Some(line)
    }

    /// Take the raw unconsumed bytes, leaving the buffer empty.
    ///
    /// Used when a protocol switches from line mode to raw byte
    /// accumulation: whatever followed the last consumed line belongs to the
    /// binary payload and must not be line-split.
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Discard any buffered fragment.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Unconsumed bytes currently buffered.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_split_across_chunks() {
        let mut r = LineReassembler::new();
        assert!(r.push(b"Starting Meas").is_empty());
        let lines = r.push(b"urement\n20 00\n");
        assert_eq!(lines, vec!["Starting Measurement", "20 00"]);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn test_crlf_stripped_in_newline_mode() {
        let mut r = LineReassembler::new();
        let lines = r.push(b"hello\r\nworld\r\n");
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn test_empty_chunk() {
        let mut r = LineReassembler::new();
        assert!(r.push(b"").is_empty());
    }

    #[test]
    fn test_cr_or_lf_mode() {
        let mut r = LineReassembler::with_terminator(LineTerminator::CrOrLf);
        let lines = r.push(b"one\rtwo\nthree\r\nfour\n");
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_trailing_cr_held_until_next_chunk() {
        let mut r = LineReassembler::with_terminator(LineTerminator::CrOrLf);
        assert!(r.push(b"partial\r").is_empty());
        // The pending \r turns out to be half of a \r\n pair.
        let lines = r.push(b"\nnext\n");
        assert_eq!(lines, vec!["partial", "next"]);
    }

    #[test]
    fn test_take_pending_returns_raw_suffix() {
        let mut r = LineReassembler::new();
        let lines = r.push(b"header\n\x01\x02\x03");
        assert_eq!(lines, vec!["header"]);
        assert_eq!(r.take_pending(), vec![1, 2, 3]);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn test_clear_drops_fragment() {
        let mut r = LineReassembler::new();
        r.push(b"no newline yet");
        r.clear();
        assert!(r.push(b"\n").first().unwrap().is_empty());
    }
}
