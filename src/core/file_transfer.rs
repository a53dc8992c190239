//! File transfer client for the payload's removable storage
//!
//! Half-duplex request/response protocol over the instrument link. Commands
//! are ASCII lines; responses are marker-delimited:
//!
//! ```text
//! -> LIST_FILES
//! <- LIST_START / <name>,<size>... / LIST_END
//!
//! -> GET_FILE <name>
//! <- FILE_START / <name> / <size> / <hex lines>... / FILE_END
//! ```
//!
//! Any response line beginning `ERROR` aborts the pending operation. Every
//! wait is individually time-bounded, and a timed-out command leaves the
//! client usable for the next one: pending buffered lines are dropped before
//! each command is sent.

use crate::core::codec;
use crate::core::line_reader::LineReassembler;
use crate::core::protocol::{
    CMD_GET_FILE, CMD_LIST_FILES, ERROR_PREFIX, FILE_END, FILE_START, LIST_END, LIST_START,
};
use crate::core::transport::{TransportError, TransportTrait};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors raised by the transfer client.
#[derive(Error, Debug)]
pub enum TransferError {
    /// No response within the bounded wait. Local to one operation.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The device reported an error line.
    #[error("device error: {0}")]
    Device(String),

    /// The accumulated hex payload could not be decoded.
    #[error("invalid hex payload: {0}")]
    Decode(#[from] hex::FromHexError),

    /// Declared and decoded sizes differ; reported, not fatal.
    #[error("size mismatch: declared {declared} bytes, received {actual}")]
    SizeMismatch {
        /// Size declared by the device
        declared: usize,
        /// Bytes actually decoded
        actual: usize,
    },

    /// Metadata line was not understood.
    #[error("malformed response: {0}")]
    Protocol(String),

    /// Transport failure; session-ending.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Writing the downloaded file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Timeout bounds for the transfer protocol.
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    /// Wait for the initial response marker after a command.
    pub response_timeout: Duration,
    /// Wait between payload/listing lines once a response started.
    pub data_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            data_timeout: Duration::from_secs(10),
        }
    }
}

/// One file listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Filename on the device
    pub name: String,
    /// Size in bytes as reported by the device
    pub size: u64,
}

/// Result of a completed download.
#[derive(Debug)]
pub struct Download {
    /// Where the file was written
    pub path: PathBuf,
    /// Size declared by the device
    pub declared: usize,
    /// Bytes actually received and written
    pub actual: usize,
    /// Size mismatch warning, when declared and actual differ
    pub warning: Option<TransferError>,
}

type ProgressHook = Box<dyn FnMut(usize, usize) + Send>;

/// Transfer client driving one transport.
pub struct FileTransferClient {
    transport: Box<dyn TransportTrait>,
    config: TransferConfig,
    lines: LineReassembler,
    pending: VecDeque<String>,
    progress: Option<ProgressHook>,
}

impl FileTransferClient {
    /// Create a client over a connected transport.
    pub fn new(transport: Box<dyn TransportTrait>, config: TransferConfig) -> Self {
        Self {
            transport,
            config,
            lines: LineReassembler::new(),
            pending: VecDeque::new(),
            progress: None,
        }
    }

    /// Install a hook called as payload bytes accumulate
    /// (`received, declared`). Presentation only.
    pub fn set_progress_hook(&mut self, hook: impl FnMut(usize, usize) + Send + 'static) {
        self.progress = Some(Box::new(hook));
    }

    /// Consume the client, returning its transport.
    pub fn into_transport(self) -> Box<dyn TransportTrait> {
        self.transport
    }

    /// Request the file listing.
    ///
    /// Malformed entries are skipped, not fatal. A missing terminator is a
    /// [`TransferError::Timeout`], which does not affect later commands.
    pub async fn list_files(&mut self) -> Result<Vec<RemoteFile>, TransferError> {
        self.send_command(CMD_LIST_FILES).await?;
        self.await_marker(LIST_START, "file list").await?;

        let mut files = Vec::new();
        loop {
            let line = self
                .read_line(self.config.data_timeout, "file list entries")
                .await?;
            if line == LIST_END {
                break;
            }
            if line.starts_with(ERROR_PREFIX) {
                return Err(TransferError::Device(line));
            }
            let mut parts = line.splitn(2, ',');
            let entry = match (parts.next(), parts.next()) {
                (Some(name), Some(size)) if !name.is_empty() => {
                    size.trim().parse::<u64>().ok().map(|size| RemoteFile {
                        name: name.to_string(),
                        size,
                    })
                }
                _ => None,
            };
            match entry {
                Some(file) => files.push(file),
                None => tracing::debug!("skipping malformed listing entry: {line}"),
            }
        }
        Ok(files)
    }

    /// Download `name` to `dest`.
    ///
    /// The hex payload is accumulated until `FILE_END`, decoded, size-checked
    /// against the declared length, and persisted. A size mismatch is
    /// reported via [`Download::warning`] while the file is still written
    /// with the bytes actually received.
    pub async fn get_file(&mut self, name: &str, dest: &Path) -> Result<Download, TransferError> {
        self.send_command(&format!("{CMD_GET_FILE} {name}")).await?;
        self.await_marker(FILE_START, "file transfer").await?;

        // Filename echo, then the declared size.
        let remote_name = self
            .read_line(self.config.data_timeout, "filename echo")
            .await?;
        tracing::debug!("device sending {remote_name}");
        let size_line = self
            .read_line(self.config.data_timeout, "declared size")
            .await?;
        let declared: usize = size_line
            .trim()
            .parse()
            .map_err(|_| TransferError::Protocol(format!("invalid size line: {size_line}")))?;

        let mut hex_text = String::new();
        let mut last_decile = 0usize;
        loop {
            let line = self
                .read_line(self.config.data_timeout, "payload data")
                .await?;
            if line == FILE_END {
                break;
            }
            if line.starts_with(ERROR_PREFIX) {
                return Err(TransferError::Device(line));
            }
            hex_text.push_str(&line);

            if let Some(hook) = self.progress.as_mut() {
                let received = hex_text.chars().filter(|c| !c.is_whitespace()).count() / 2;
                let decile = if declared > 0 {
                    received * 10 / declared
                } else {
                    0
                };
                if decile > last_decile {
                    last_decile = decile;
                    hook(received, declared);
                }
            }
        }

        let payload = codec::decode_hex_payload(&hex_text)?;
        let actual = payload.len();
        let warning = (actual != declared).then(|| TransferError::SizeMismatch {
            declared,
            actual,
        });

        std::fs::write(dest, &payload).map_err(|source| TransferError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        Ok(Download {
            path: dest.to_path_buf(),
            declared,
            actual,
            warning,
        })
    }

    /// Send one command line, discarding any stale buffered input so a
    /// previous timed-out operation cannot contaminate this one.
    async fn send_command(&mut self, command: &str) -> Result<(), TransferError> {
        self.pending.clear();
        self.lines.clear();
        self.transport
            .send(format!("{command}\n").as_bytes())
            .await?;
        Ok(())
    }

    /// Wait for a marker line, failing on an `ERROR` response.
    async fn await_marker(
        &mut self,
        marker: &str,
        what: &'static str,
    ) -> Result<(), TransferError> {
        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let line = self.read_line_until(deadline, what).await?;
            if line == marker {
                return Ok(());
            }
            if line.starts_with(ERROR_PREFIX) {
                return Err(TransferError::Device(line));
            }
            // Unrelated chatter before the marker is ignored.
        }
    }

    async fn read_line(
        &mut self,
        wait: Duration,
        what: &'static str,
    ) -> Result<String, TransferError> {
        self.read_line_until(Instant::now() + wait, what).await
    }

    /// Pop the next non-empty line, polling the transport with short bounded
    /// reads until `deadline`.
    async fn read_line_until(
        &mut self,
        deadline: Instant,
        what: &'static str,
    ) -> Result<String, TransferError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    return Ok(line);
                }
                continue;
            }
            if Instant::now() >= deadline {
                return Err(TransferError::Timeout(what));
            }
            let chunk = self.transport.receive().await?;
            if chunk.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
            self.pending.extend(self.lines.push(&chunk));
        }
    }
}
