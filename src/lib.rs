//! # Viamon Core Library
//!
//! Capture and extraction engine for the VIA spectrometer payload's serial
//! console. The payload emits an interleaved text/binary stream: free-form
//! status chatter, marker-delimited measurement sections (raw hex dumps and
//! pixel/intensity CSV blocks), a request/response file-retrieval protocol
//! for the on-board SD card, and a binary-framed radio downlink format.
//!
//! ## Features
//!
//! - Line reassembly over arbitrarily chunked serial reads
//! - Marker classification and a session state machine that demultiplexes
//!   the stream into a verbatim log plus per-measurement artifacts
//! - Interactive pass-through console with automatic capture
//! - `LIST_FILES` / `GET_FILE` transfer client for removable storage
//! - Ground-station receiver for the radio frame format
//! - Virtual instrument simulator for tests and benches
//!
//! ## Example
//!
//! ```rust,no_run
//! use viamon_core::{SerialConfig, SerialTransport, TransportTrait};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SerialConfig::new("/dev/ttyACM0", 115_200);
//!     let mut transport = SerialTransport::new(config)?;
//!     transport.connect().await?;
//!     transport.send(b"VIA_STATUS\n").await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::AppConfig;
pub use crate::core::classifier::{Classifier, LineClass};
pub use crate::core::file_transfer::{Download, FileTransferClient, RemoteFile, TransferError};
pub use crate::core::ground::{RadioEvent, RadioFramer};
pub use crate::core::line_reader::{LineReassembler, LineTerminator};
pub use crate::core::progress::ProgressBar;
pub use crate::core::session::{CaptureEvent, EngineConfig, SectionKind, SessionEngine};
pub use crate::core::sink::{SessionSink, SinkError};
pub use crate::core::transport::{
    MemoryTransport, SerialConfig, SerialTransport, Transport, TransportError, TransportTrait,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
