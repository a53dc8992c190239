//! Ground-station receiver for the radio downlink framing
//!
//! Frames are not line-delimited. A text header `VIA:<size>:` switches the
//! link into raw byte accumulation; the frame ends when the literal `:END`
//! sequence appears anywhere in the accumulated buffer — the delimiter may
//! arrive split across reads, and bytes after it belong to the next frame.
//! The declared size drives progress display only; frame end is always
//! delimiter-based.

use crate::core::line_reader::{LineReassembler, LineTerminator};
use crate::core::protocol::{RADIO_DELIMITER, RADIO_HEADER_PREFIX};

/// Event produced while feeding the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A chatter line received outside any frame.
    Line(String),
    /// A frame header was recognized.
    FrameStarted {
        /// Payload size declared in the header
        declared: usize,
    },
    /// Bytes accumulated toward the current frame.
    Progress {
        /// Bytes received so far
        received: usize,
        /// Declared payload size
        declared: usize,
    },
    /// A complete frame was delimited.
    Frame {
        /// Payload bytes preceding the delimiter
        payload: Vec<u8>,
        /// Declared payload size (may differ from `payload.len()`)
        declared: usize,
    },
}

enum FramerState {
    /// Scanning chatter lines for a frame header.
    Lines,
    /// Accumulating raw payload bytes until the delimiter.
    Receiving {
        declared: usize,
        buf: Vec<u8>,
    },
}

/// Incremental radio frame decoder.
pub struct RadioFramer {
    lines: LineReassembler,
    state: FramerState,
}

impl RadioFramer {
    /// Create a framer in line-scanning mode.
    pub fn new() -> Self {
        Self {
            lines: LineReassembler::with_terminator(LineTerminator::CrOrLf),
            state: FramerState::Lines,
        }
    }

    /// Feed one received chunk, returning the events it produced.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RadioEvent> {
        let mut events = Vec::new();
        self.feed(chunk, &mut events);
        events
    }

    fn feed(&mut self, chunk: &[u8], events: &mut Vec<RadioEvent>) {
        match &mut self.state {
            FramerState::Lines => {
                self.lines.push_bytes(chunk);
                while let Some(line) = self.lines.next_line() {
                    let line = line.trim().to_string();
                    match parse_header(&line) {
                        Some(declared) => {
                            events.push(RadioEvent::FrameStarted { declared });
                            // Whatever followed the header line is already
                            // payload; it must not be line-split.
                            let buf = self.lines.take_pending();
                            self.state = FramerState::Receiving { declared, buf };
                            self.scan_for_delimiter(events);
                            return;
                        }
                        None => {
                            if !line.is_empty() {
                                events.push(RadioEvent::Line(line));
                            }
                        }
                    }
                }
            }
            FramerState::Receiving { buf, .. } => {
                buf.extend_from_slice(chunk);
                self.scan_for_delimiter(events);
            }
        }
    }

    /// Look for the delimiter in the accumulated buffer; on a hit, emit the
    /// frame and re-enter line mode with the remaining bytes.
    fn scan_for_delimiter(&mut self, events: &mut Vec<RadioEvent>) {
        let FramerState::Receiving { declared, buf } = &mut self.state else {
            return;
        };
        let declared = *declared;

        match find_delimiter(buf) {
            Some(idx) => {
                let payload = buf[..idx].to_vec();
                let remainder = buf[idx + RADIO_DELIMITER.len()..].to_vec();
                events.push(RadioEvent::Frame { payload, declared });
                self.state = FramerState::Lines;
                self.lines.clear();
                if !remainder.is_empty() {
                    self.feed(&remainder, events);
                }
            }
            None => {
                events.push(RadioEvent::Progress {
                    received: buf.len(),
                    declared,
                });
            }
        }
    }
}

impl Default for RadioFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `VIA:<size>:` header line; `None` when the size is unparsable.
fn parse_header(line: &str) -> Option<usize> {
    if !line.starts_with(RADIO_HEADER_PREFIX) {
        return None;
    }
    line.split(':').nth(1)?.parse().ok()
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(RADIO_DELIMITER.len())
        .position(|w| w == RADIO_DELIMITER)
}
