//! In-memory loopback transport
//!
//! Stands in for the serial link in tests: received chunks are scripted up
//! front (preserving chunk boundaries, which matter to the reassembler and
//! framer), and everything sent is retained for inspection.

use super::{TransportError, TransportStats, TransportTrait, TransportType};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Scriptable loopback transport.
#[derive(Default)]
pub struct MemoryTransport {
    incoming: Arc<Mutex<VecDeque<Bytes>>>,
    outgoing: Arc<Mutex<Vec<u8>>>,
    connected: bool,
    stats: TransportStats,
}

impl MemoryTransport {
    /// Create an empty, disconnected transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk to be returned by a future `receive` call.
    pub fn push_incoming(&self, chunk: &[u8]) {
        self.incoming
            .lock()
            .push_back(Bytes::copy_from_slice(chunk));
    }

    /// Queue several chunks, preserving their boundaries.
    pub fn script<I, C>(&self, chunks: I)
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut incoming = self.incoming.lock();
        for chunk in chunks {
            incoming.push_back(Bytes::copy_from_slice(chunk.as_ref()));
        }
    }

    /// Everything sent through this transport so far.
    pub fn sent(&self) -> Vec<u8> {
        self.outgoing.lock().clone()
    }

    /// Sent bytes decoded as UTF-8 (lossy).
    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.outgoing.lock()).into_owned()
    }

    /// Handle for scripting more input after the transport is boxed.
    pub fn feeder(&self) -> MemoryFeeder {
        MemoryFeeder {
            incoming: Arc::clone(&self.incoming),
        }
    }

    /// Handle for inspecting sent bytes after the transport is boxed.
    pub fn sent_probe(&self) -> MemorySentProbe {
        MemorySentProbe {
            outgoing: Arc::clone(&self.outgoing),
        }
    }
}

/// Cloneable handle observing everything sent through a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemorySentProbe {
    outgoing: Arc<Mutex<Vec<u8>>>,
}

impl MemorySentProbe {
    /// Sent bytes so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.outgoing.lock().clone()
    }

    /// Sent bytes decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.outgoing.lock()).into_owned()
    }
}

/// Cloneable handle used to push incoming chunks into a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryFeeder {
    incoming: Arc<Mutex<VecDeque<Bytes>>>,
}

impl MemoryFeeder {
    /// Queue a chunk for a future `receive` call.
    pub fn push(&self, chunk: &[u8]) {
        self.incoming
            .lock()
            .push_back(Bytes::copy_from_slice(chunk));
    }
}

#[async_trait]
impl TransportTrait for MemoryTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.outgoing.lock().extend_from_slice(data);
        self.stats.bytes_sent += data.len() as u64;
        Ok(data.len())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        match self.incoming.lock().pop_front() {
            Some(chunk) => {
                self.stats.bytes_received += chunk.len() as u64;
                Ok(chunk)
            }
            None => Ok(Bytes::new()),
        }
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    fn connection_info(&self) -> String {
        "memory loopback".to_string()
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
