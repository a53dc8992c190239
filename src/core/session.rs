//! Session state machine
//!
//! Demultiplexes the instrument's console stream into the verbatim session
//! log, per-measurement artifacts, and display events. This is the single
//! owner of all capture state: section flags, buffers, and the in-flight
//! measurement live here and are mutated by exactly one task.
//!
//! States: `idle → in-measurement → {hex | csv | sd} → in-measurement →
//! idle`. Block sub-states are sequential, never concurrent; opening one
//! block closes any other still open. A block marker seen while idle
//! implicitly opens a measurement, matching firmware that emits data
//! sections without the outer measurement banner.
//!
//! Presentation is strictly downstream: the engine emits [`CaptureEvent`]s
//! and never renders anything itself, so disabling the progress display
//! cannot change what is captured.

use crate::core::classifier::{Classifier, LineClass};
use crate::core::line_reader::LineReassembler;
use crate::core::protocol::{CSV_ROWS_PER_MEASUREMENT, HEX_LINES_PER_MEASUREMENT};
use crate::core::sink::SessionSink;
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of data section within a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Raw hex dump of the full measurement buffer.
    Hex,
    /// Decoded pixel/intensity CSV rows.
    Csv,
    /// SD card data dump.
    Sd,
}

impl SectionKind {
    /// Expected entry count for progress display; 0 when unknown.
    pub fn expected_lines(self) -> usize {
        match self {
            Self::Hex => HEX_LINES_PER_MEASUREMENT,
            Self::Csv => CSV_ROWS_PER_MEASUREMENT,
            Self::Sd => 0,
        }
    }

    /// Display label for progress output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hex => "Hex dump",
            Self::Csv => "CSV rows",
            Self::Sd => "SD data",
        }
    }
}

/// Which section kinds the engine captures.
#[derive(Debug, Clone, Copy)]
pub struct SectionToggles {
    /// Capture raw hex dump sections.
    pub hex: bool,
    /// Capture pixel CSV sections.
    pub csv: bool,
    /// Capture SD data sections.
    pub sd: bool,
}

impl Default for SectionToggles {
    fn default() -> Self {
        Self {
            hex: true,
            csv: true,
            sd: true,
        }
    }
}

impl SectionToggles {
    fn enabled(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Hex => self.hex,
            SectionKind::Csv => self.csv,
            SectionKind::Sd => self.sd,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Echo block-internal lines instead of rendering progress.
    pub verbose: bool,
    /// Section kinds to capture; disabled kinds pass through untouched.
    pub sections: SectionToggles,
}

/// One in-flight measurement's buffers.
#[derive(Debug, Default)]
struct Measurement {
    basename: String,
    hex_lines: Vec<String>,
    csv_rows: Vec<(u32, i32)>,
    sd_lines: Vec<String>,
}

/// Display/side-effect event emitted while feeding the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A line to show the operator.
    Line(String),
    /// A captured entry advanced an open section.
    Progress {
        /// Section being captured
        kind: SectionKind,
        /// Entries captured so far
        current: usize,
        /// Expected entry count (0 when unknown)
        expected: usize,
    },
    /// A section closed; counts may disagree, which is display-only.
    SectionClosed {
        /// Section that closed
        kind: SectionKind,
        /// Expected entry count
        expected: usize,
        /// Entries actually captured
        actual: usize,
    },
    /// An artifact file was written.
    Saved {
        /// Artifact path
        path: PathBuf,
        /// Entries written
        lines: usize,
    },
    /// A new measurement was allocated.
    MeasurementStarted {
        /// Artifact base name
        basename: String,
    },
    /// An in-flight measurement was discarded without writing files.
    MeasurementDiscarded {
        /// Base name of the discarded measurement
        basename: String,
    },
    /// A measurement cycle completed.
    MeasurementComplete,
    /// A sink write failed; the session continues.
    SinkError(String),
}

/// The capture engine: owns session state and drives the sink.
pub struct SessionEngine {
    id: Uuid,
    config: EngineConfig,
    classifier: Classifier,
    lines: LineReassembler,
    sink: SessionSink,
    current: Option<Measurement>,
    open_section: Option<SectionKind>,
}

impl SessionEngine {
    /// Create an engine writing through `sink`.
    pub fn new(sink: SessionSink, config: EngineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            classifier: Classifier::new(),
            lines: LineReassembler::new(),
            sink,
            current: None,
            open_section: None,
        }
    }

    /// Engine instance id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The sink this engine writes through.
    pub fn sink(&self) -> &SessionSink {
        &self.sink
    }

    /// True while a measurement is in flight.
    pub fn in_measurement(&self) -> bool {
        self.current.is_some()
    }

    /// Feed one received chunk.
    ///
    /// The raw text is appended to the session log unconditionally — the log
    /// is verbatim regardless of verbosity — then complete lines are run
    /// through the classifier and state machine.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<CaptureEvent> {
        let mut events = Vec::new();

        let text = String::from_utf8_lossy(chunk);
        if let Err(e) = self.sink.append_log(&text) {
            tracing::warn!("session log write failed: {e}");
            events.push(CaptureEvent::SinkError(e.to_string()));
        }

        for line in self.lines.push(chunk) {
            self.handle_line(&line, &mut events);
        }
        events
    }

    /// Finish the session: discard any in-flight measurement without
    /// writing partial files, and flush the log.
    pub fn finish(&mut self) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        self.open_section = None;
        if let Some(m) = self.current.take() {
            events.push(CaptureEvent::MeasurementDiscarded {
                basename: m.basename,
            });
        }
        self.sink.flush();
        events
    }

    fn handle_line(&mut self, raw: &str, events: &mut Vec<CaptureEvent>) {
        let line = raw.trim();
        let mut class = self.classifier.classify(line);

        // Disabled section kinds degrade to passthrough.
        if let Some(kind) = marker_section(class) {
            if !self.config.sections.enabled(kind) {
                class = LineClass::Other;
            }
        }

        match class {
            LineClass::MeasurementStart => {
                // A restart mid-measurement means the device rebooted; the
                // partial capture is unusable and must not produce files.
                self.open_section = None;
                if let Some(m) = self.current.take() {
                    tracing::warn!("measurement restarted; discarding {}", m.basename);
                    events.push(CaptureEvent::MeasurementDiscarded {
                        basename: m.basename,
                    });
                }
                self.start_measurement(events);
                events.push(CaptureEvent::Line(line.to_string()));
            }
            LineClass::MeasurementEnd => {
                self.open_section = None;
                self.current = None;
                events.push(CaptureEvent::Line(line.to_string()));
                events.push(CaptureEvent::MeasurementComplete);
            }
            LineClass::HexStart => self.open_block(SectionKind::Hex, line, events),
            LineClass::CsvStart => self.open_block(SectionKind::Csv, line, events),
            LineClass::SdStart => self.open_block(SectionKind::Sd, line, events),
            LineClass::HexEnd => self.close_block(SectionKind::Hex, line, events),
            LineClass::CsvEnd => self.close_block(SectionKind::Csv, line, events),
            LineClass::SdEnd => self.close_block(SectionKind::Sd, line, events),
            LineClass::HexData => {
                let captured = match (self.open_section, self.current.as_mut()) {
                    (Some(kind @ (SectionKind::Hex | SectionKind::Sd)), Some(m)) => {
                        let current = match kind {
                            SectionKind::Hex => {
                                m.hex_lines.push(line.to_string());
                                m.hex_lines.len()
                            }
                            _ => {
                                m.sd_lines.push(line.to_string());
                                m.sd_lines.len()
                            }
                        };
                        Some((kind, current))
                    }
                    _ => None,
                };
                match captured {
                    Some((kind, current)) => {
                        events.push(CaptureEvent::Progress {
                            kind,
                            current,
                            expected: kind.expected_lines(),
                        });
                        if self.config.verbose {
                            events.push(CaptureEvent::Line(line.to_string()));
                        }
                    }
                    None => self.passthrough(line, events),
                }
            }
            LineClass::CsvData => {
                let captured = match (self.open_section, self.current.as_mut()) {
                    (Some(SectionKind::Csv), Some(m)) => {
                        Some(Classifier::parse_csv_row(line).map(|row| {
                            m.csv_rows.push(row);
                            m.csv_rows.len()
                        }))
                    }
                    _ => None,
                };
                match captured {
                    Some(row_count) => {
                        if let Some(current) = row_count {
                            events.push(CaptureEvent::Progress {
                                kind: SectionKind::Csv,
                                current,
                                expected: CSV_ROWS_PER_MEASUREMENT,
                            });
                        }
                        if self.config.verbose {
                            events.push(CaptureEvent::Line(line.to_string()));
                        }
                    }
                    None => self.passthrough(line, events),
                }
            }
            LineClass::CsvHeader => {
                // Inside a CSV block the header is decoration, not data.
                if self.open_section != Some(SectionKind::Csv) {
                    self.passthrough(line, events);
                } else if self.config.verbose {
                    events.push(CaptureEvent::Line(line.to_string()));
                }
            }
            LineClass::Other => self.passthrough(line, events),
        }
    }

    /// Forward a line to the operator unless it is block-internal noise in
    /// non-verbose mode. Suppressed lines are still in the session log.
    fn passthrough(&self, line: &str, events: &mut Vec<CaptureEvent>) {
        if self.open_section.is_none() || self.config.verbose {
            events.push(CaptureEvent::Line(line.to_string()));
        }
    }

    fn start_measurement(&mut self, events: &mut Vec<CaptureEvent>) {
        let basename = self.sink.next_measurement_name();
        events.push(CaptureEvent::MeasurementStarted {
            basename: basename.clone(),
        });
        self.current = Some(Measurement {
            basename,
            ..Measurement::default()
        });
    }

    fn open_block(&mut self, kind: SectionKind, line: &str, events: &mut Vec<CaptureEvent>) {
        // Finish whatever block is still open; blocks never nest.
        if let Some(open) = self.open_section {
            if open != kind {
                self.write_section(open, events);
            }
        }
        if self.current.is_none() {
            self.start_measurement(events);
        }
        // Reset the buffer for this kind; a reopened block starts fresh.
        if let Some(m) = self.current.as_mut() {
            match kind {
                SectionKind::Hex => m.hex_lines.clear(),
                SectionKind::Csv => m.csv_rows.clear(),
                SectionKind::Sd => m.sd_lines.clear(),
            }
        }
        self.open_section = Some(kind);
        events.push(CaptureEvent::Line(line.to_string()));
    }

    fn close_block(&mut self, kind: SectionKind, line: &str, events: &mut Vec<CaptureEvent>) {
        if self.open_section == Some(kind) {
            self.write_section(kind, events);
            events.push(CaptureEvent::Line(line.to_string()));
        } else {
            // Stray end marker; nothing to close.
            self.passthrough(line, events);
        }
    }

    /// Write one section's buffer and close it. Write failures are surfaced
    /// as events and logged, never fatal for the session.
    fn write_section(&mut self, kind: SectionKind, events: &mut Vec<CaptureEvent>) {
        self.open_section = None;
        let Some(m) = self.current.as_ref() else {
            return;
        };

        let (result, actual) = match kind {
            SectionKind::Hex => (
                self.sink.write_hex_capture(&m.basename, &m.hex_lines),
                m.hex_lines.len(),
            ),
            SectionKind::Csv => (
                self.sink.write_pixel_csv(&m.basename, &m.csv_rows),
                m.csv_rows.len(),
            ),
            SectionKind::Sd => (
                self.sink.write_sd_capture(&m.basename, &m.sd_lines),
                m.sd_lines.len(),
            ),
        };

        events.push(CaptureEvent::SectionClosed {
            kind,
            expected: kind.expected_lines(),
            actual,
        });

        match result {
            Ok(Some(path)) => events.push(CaptureEvent::Saved {
                path,
                lines: actual,
            }),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("artifact write failed: {e}");
                events.push(CaptureEvent::SinkError(e.to_string()));
            }
        }
    }
}

fn marker_section(class: LineClass) -> Option<SectionKind> {
    match class {
        LineClass::HexStart | LineClass::HexEnd => Some(SectionKind::Hex),
        LineClass::CsvStart | LineClass::CsvEnd => Some(SectionKind::Csv),
        LineClass::SdStart | LineClass::SdEnd => Some(SectionKind::Sd),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dir: &std::path::Path, verbose: bool) -> SessionEngine {
        let sink = SessionSink::derived(dir, "VIA.20251108.1845");
        SessionEngine::new(
            sink,
            EngineConfig {
                verbose,
                ..EngineConfig::default()
            },
        )
    }

    #[test]
    fn test_hex_cycle_writes_sentinel_txt() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"Reading full 4106-byte measurement...\n20 00\nFull 4106 bytes received\n");
        let body =
            std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.txt")).unwrap();
        assert_eq!(body, "===VIA START===\n20 00\n===VIA STOP===\n");
        assert!(!tmp.path().join("VIA.20251108.1845.01.csv").exists());
    }

    #[test]
    fn test_stray_data_outside_section_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        let events = e.feed(b"20 00 5A\n1,2\n");
        // Passed through, not captured.
        assert!(events
            .iter()
            .all(|ev| matches!(ev, CaptureEvent::Line(_))));
        assert!(!e.in_measurement());
    }

    #[test]
    fn test_restart_discards_inflight_measurement() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"Starting Measurement #1\nReading full 4106-byte measurement\nAA BB\n");
        let events = e.feed(b"Starting Measurement #2\n");
        assert!(events
            .iter()
            .any(|ev| matches!(ev, CaptureEvent::MeasurementDiscarded { .. })));
        // Nothing was written for the aborted measurement.
        assert!(!tmp.path().join("VIA.20251108.1845.01.txt").exists());

        e.feed(b"Reading full 4106-byte measurement\nCC DD\nFull 4106 bytes received\n");
        let body =
            std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.02.txt")).unwrap();
        assert!(body.contains("CC DD"));
        assert!(!body.contains("AA BB"));
    }

    #[test]
    fn test_csv_cycle_rows_and_header() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"CSV DATA OUTPUT:\nPixel,Intensity\n0,1000\n1,2000\n2,-3\nEND CSV DATA\n");
        let body =
            std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.csv")).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "Pixel,Intensity");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "2,-3");
    }

    #[test]
    fn test_verbosity_does_not_change_files() {
        let quiet_dir = tempfile::tempdir().unwrap();
        let loud_dir = tempfile::tempdir().unwrap();
        let stream: &[u8] =
            b"Reading full 4106-byte measurement\n20 00\nchunk 1/257 ok\n21 01\nFull 4106 bytes received\n";

        let mut quiet = engine(quiet_dir.path(), false);
        let mut loud = engine(loud_dir.path(), true);
        quiet.feed(stream);
        loud.feed(stream);

        let a = std::fs::read_to_string(quiet_dir.path().join("VIA.20251108.1845.01.txt"))
            .unwrap();
        let b = std::fs::read_to_string(loud_dir.path().join("VIA.20251108.1845.01.txt"))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_block_internal_noise_suppressed_unless_verbose() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"Reading full 4106-byte measurement\n");
        let events = e.feed(b"chunk 1/257 received\n");
        assert!(events.is_empty());

        let tmp2 = tempfile::tempdir().unwrap();
        let mut v = engine(tmp2.path(), true);
        v.feed(b"Reading full 4106-byte measurement\n");
        let events = v.feed(b"chunk 1/257 received\n");
        assert_eq!(
            events,
            vec![CaptureEvent::Line("chunk 1/257 received".to_string())]
        );
    }

    #[test]
    fn test_sd_block_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"SD CARD DATA DUMP:\nDE AD BE EF\nEND SD\n");
        let body =
            std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.sd")).unwrap();
        assert_eq!(body, "===VIA START===\nDE AD BE EF\n===VIA STOP===\n");
    }

    #[test]
    fn test_finish_discards_partial_measurement() {
        let tmp = tempfile::tempdir().unwrap();
        let mut e = engine(tmp.path(), false);
        e.feed(b"Reading full 4106-byte measurement\n20 00\n");
        let events = e.finish();
        assert!(events
            .iter()
            .any(|ev| matches!(ev, CaptureEvent::MeasurementDiscarded { .. })));
        assert!(!tmp.path().join("VIA.20251108.1845.01.txt").exists());
    }

    #[test]
    fn test_disabled_section_passes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SessionSink::derived(tmp.path(), "VIA.20251108.1845");
        let mut e = SessionEngine::new(
            sink,
            EngineConfig {
                verbose: false,
                sections: SectionToggles {
                    sd: false,
                    ..SectionToggles::default()
                },
            },
        );
        e.feed(b"SD CARD DATA DUMP:\nDE AD\nEND SD\n");
        assert!(!tmp.path().join("VIA.20251108.1845.01.sd").exists());
        assert!(!e.in_measurement());
    }
}
