//! Transport layer for the instrument link
//!
//! The payload talks over a single serial connection; an in-memory loopback
//! transport stands in for the hardware in tests and when replaying
//! simulator output.

mod memory;
mod serial;

pub use memory::{MemoryFeeder, MemorySentProbe, MemoryTransport};
pub use serial::{list_ports, SerialConfig, SerialFlowControl, SerialParity, SerialTransport};

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Transport configuration enumeration.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Serial port connection
    Serial(SerialConfig),
}

/// Transport type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// In-memory loopback
    Memory,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Memory => write!(f, "Memory"),
        }
    }
}

/// Transport error types.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,

    /// Send error
    #[error("Send error: {0}")]
    SendError(String),
}

/// Transport statistics.
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Transport trait for the instrument link.
#[async_trait]
pub trait TransportTrait: Send + Sync {
    /// Connect to the target.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Disconnect from the target.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if connected.
    fn is_connected(&self) -> bool;

    /// Send data.
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Receive available data; returns empty bytes after a short bounded
    /// wait when nothing arrived, never blocking indefinitely.
    async fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Get transport type.
    fn transport_type(&self) -> TransportType;

    /// Get connection info string.
    fn connection_info(&self) -> String;

    /// Get statistics.
    fn stats(&self) -> TransportStats;
}

/// Create a transport instance from configuration.
pub fn create_transport(config: Transport) -> Result<Box<dyn TransportTrait>, TransportError> {
    match config {
        Transport::Serial(cfg) => {
            let transport = SerialTransport::new(cfg)?;
            Ok(Box::new(transport))
        }
    }
}
