//! Core module containing the main functionality of Viamon
//!
//! This module provides:
//! - Transport layer for the serial link (plus an in-memory loopback)
//! - Line reassembly over arbitrarily chunked reads
//! - Marker classification for the instrument's console protocol
//! - Session state machine demultiplexing the stream into log + artifacts
//! - Output sink managing the session directory and measurement files
//! - Progress reporting
//! - Interactive pass-through console
//! - File transfer client for on-board removable storage
//! - Ground-station receiver for the binary radio frame format
//! - Virtual instrument simulator

pub mod classifier;
pub mod codec;
pub mod console;
pub mod file_transfer;
pub mod ground;
pub mod line_reader;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod simulator;
pub mod sink;
pub mod transport;
