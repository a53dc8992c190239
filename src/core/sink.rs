//! Output sink for session logs and measurement artifacts
//!
//! One sink owns one session: a timestamped directory, the verbatim session
//! log, and the per-measurement artifact files. The log is flushed on every
//! append so a concurrent `tail -f` sees data as it arrives. Artifact writes
//! are whole-file rewrites; an empty buffer produces no file at all.
//!
//! Directory layout:
//!
//! ```text
//! <base>/YYYYMMDD.HHMM/
//! ├── VIA.YYYYMMDD.HHMM.log       full session log
//! ├── VIA.YYYYMMDD.HHMM.SS.csv    measurement pixel data
//! ├── VIA.YYYYMMDD.HHMM.SS.txt    measurement raw hex capture
//! └── VIA.YYYYMMDD.HHMM.SS.sd     SD block capture
//! ```

use crate::core::codec;
use crate::core::protocol::{CAPTURE_SENTINEL_START, CAPTURE_SENTINEL_STOP, CSV_HEADER};
use chrono::Local;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem error raised by the sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Session directory could not be created. Fatal for the whole run.
    #[error("failed to create session directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Session log could not be opened. Fatal for the whole run.
    #[error("failed to open session log {path}: {source}")]
    OpenLog {
        /// Log file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A file write failed. Surfaced but not fatal for the session.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File being written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Artifact naming scheme.
enum Naming {
    /// Per-second wall-clock stamps, as during live capture.
    WallClock,
    /// `<stem>.NN` counter suffixes, for deterministic offline extraction.
    Derived { stem: String, counter: u32 },
}

/// Owns the session directory, log handle, and artifact naming.
pub struct SessionSink {
    dir: PathBuf,
    session_stamp: String,
    log: Option<File>,
    naming: Naming,
}

impl SessionSink {
    /// Create a session directory under `base` named by the current minute
    /// and open its log file.
    pub fn open(base: &Path) -> Result<Self, SinkError> {
        let stamp = Local::now().format("%Y%m%d.%H%M").to_string();
        Self::open_at(base, &stamp)
    }

    /// Create a session directory with an explicit minute stamp.
    pub fn open_at(base: &Path, stamp: &str) -> Result<Self, SinkError> {
        let dir = base.join(stamp);
        fs::create_dir_all(&dir).map_err(|source| SinkError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let log_path = dir.join(format!("VIA.{stamp}.log"));
        let log = File::create(&log_path).map_err(|source| SinkError::OpenLog {
            path: log_path,
            source,
        })?;

        Ok(Self {
            dir,
            session_stamp: stamp.to_string(),
            log: Some(log),
            naming: Naming::WallClock,
        })
    }

    /// Open a sink for offline extraction: artifacts are written into `dir`
    /// as `<stem>.NN.*`, and no session log is kept (the log already
    /// exists — it is the input).
    pub fn derived(dir: &Path, stem: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            session_stamp: stem.to_string(),
            log: None,
            naming: Naming::Derived {
                stem: stem.to_string(),
                counter: 0,
            },
        }
    }

    /// Session directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Minute-resolution session stamp.
    pub fn session_stamp(&self) -> &str {
        &self.session_stamp
    }

    /// Session log filename, when a log is kept.
    pub fn log_filename(&self) -> Option<String> {
        self.log
            .as_ref()
            .map(|_| format!("VIA.{}.log", self.session_stamp))
    }

    /// Append raw text to the session log and flush immediately.
    pub fn append_log(&mut self, text: &str) -> Result<(), SinkError> {
        if let Some(log) = self.log.as_mut() {
            let path = self.dir.join(format!("VIA.{}.log", self.session_stamp));
            log.write_all(text.as_bytes())
                .and_then(|()| log.flush())
                .map_err(|source| SinkError::Write { path, source })?;
        }
        Ok(())
    }

    /// Produce the base name for the next measurement's artifacts.
    ///
    /// Wall-clock names are monotonically non-decreasing within a session;
    /// derived names use a strictly increasing counter.
    pub fn next_measurement_name(&mut self) -> String {
        match &mut self.naming {
            Naming::WallClock => {
                format!("VIA.{}", Local::now().format("%Y%m%d.%H%M.%S"))
            }
            Naming::Derived { stem, counter } => {
                *counter += 1;
                format!("{stem}.{counter:02}")
            }
        }
    }

    /// Write a raw hex capture as a sentinel-wrapped `.txt` artifact.
    ///
    /// Returns `None` without creating a file when `lines` is empty.
    pub fn write_hex_capture(
        &self,
        basename: &str,
        lines: &[String],
    ) -> Result<Option<PathBuf>, SinkError> {
        self.write_sentinel_file(&format!("{basename}.txt"), lines)
    }

    /// Write an SD block capture as a sentinel-wrapped `.sd` artifact.
    pub fn write_sd_capture(
        &self,
        basename: &str,
        lines: &[String],
    ) -> Result<Option<PathBuf>, SinkError> {
        self.write_sentinel_file(&format!("{basename}.sd"), lines)
    }

    /// Write decoded pixel rows as a headered `.csv` artifact.
    pub fn write_pixel_csv(
        &self,
        basename: &str,
        rows: &[(u32, i32)],
    ) -> Result<Option<PathBuf>, SinkError> {
        if rows.is_empty() {
            return Ok(None);
        }
        let path = self.dir.join(format!("{basename}.csv"));
        let mut body = String::with_capacity(rows.len() * 12);
        body.push_str(CSV_HEADER);
        body.push('\n');
        for (pixel, intensity) in rows {
            body.push_str(&format!("{pixel},{intensity}\n"));
        }
        fs::write(&path, body).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }

    /// Write a radio frame payload as a sentinel-wrapped 16-byte-wide hex
    /// dump, named like a measurement artifact.
    pub fn write_radio_frame(&mut self, payload: &[u8]) -> Result<PathBuf, SinkError> {
        let basename = self.next_measurement_name();
        let path = self.dir.join(format!("{basename}.txt"));
        let mut body = String::new();
        body.push_str(CAPTURE_SENTINEL_START);
        body.push('\n');
        for line in codec::hex_dump(payload) {
            body.push_str(&line);
            body.push('\n');
        }
        body.push_str(CAPTURE_SENTINEL_STOP);
        body.push('\n');
        fs::write(&path, body).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn write_sentinel_file(
        &self,
        filename: &str,
        lines: &[String],
    ) -> Result<Option<PathBuf>, SinkError> {
        if lines.is_empty() {
            return Ok(None);
        }
        let path = self.dir.join(filename);
        let mut body = String::new();
        body.push_str(CAPTURE_SENTINEL_START);
        body.push('\n');
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str(CAPTURE_SENTINEL_STOP);
        body.push('\n');
        fs::write(&path, body).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }

    /// Flush the session log.
    pub fn flush(&mut self) {
        if let Some(log) = self.log.as_mut() {
            let _ = log.flush();
        }
    }
}

impl Drop for SessionSink {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_directory_and_log() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = SessionSink::open_at(tmp.path(), "20251108.1845").unwrap();
        assert!(sink.dir().is_dir());
        sink.append_log("hello\n").unwrap();
        sink.append_log("world\n").unwrap();
        let log = std::fs::read_to_string(sink.dir().join("VIA.20251108.1845.log")).unwrap();
        assert_eq!(log, "hello\nworld\n");
    }

    #[test]
    fn test_hex_capture_wrapped_in_sentinels() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SessionSink::open_at(tmp.path(), "20251108.1845").unwrap();
        let lines = vec!["20 00".to_string(), "5A 01".to_string()];
        let path = sink
            .write_hex_capture("VIA.20251108.1845.07", &lines)
            .unwrap()
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert_eq!(body, "===VIA START===\n20 00\n5A 01\n===VIA STOP===\n");
    }

    #[test]
    fn test_empty_buffer_writes_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SessionSink::open_at(tmp.path(), "20251108.1845").unwrap();
        assert!(sink.write_hex_capture("x", &[]).unwrap().is_none());
        assert!(sink.write_pixel_csv("x", &[]).unwrap().is_none());
        assert!(!sink.dir().join("x.txt").exists());
        assert!(!sink.dir().join("x.csv").exists());
    }

    #[test]
    fn test_pixel_csv_header_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SessionSink::open_at(tmp.path(), "20251108.1845").unwrap();
        let path = sink
            .write_pixel_csv("m", &[(0, 1000), (1, -2)])
            .unwrap()
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert_eq!(body, "Pixel,Intensity\n0,1000\n1,-2\n");
    }

    #[test]
    fn test_derived_naming_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = SessionSink::derived(tmp.path(), "VIA.20251108.1845");
        assert_eq!(sink.next_measurement_name(), "VIA.20251108.1845.01");
        assert_eq!(sink.next_measurement_name(), "VIA.20251108.1845.02");
        // Derived sinks keep no log; appends are accepted and dropped.
        sink.append_log("ignored").unwrap();
    }

    #[test]
    fn test_radio_frame_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = SessionSink::derived(tmp.path(), "VIA.20251108.1845");
        let payload: Vec<u8> = (0u8..18).collect();
        let path = sink.write_radio_frame(&payload).unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.first(), Some(&"===VIA START==="));
        assert_eq!(lines.last(), Some(&"===VIA STOP==="));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("00 01 02"));
        assert_eq!(lines[2], "10 11");
    }
}
