//! Mock transports for testing

use super::{Connector, DatagramTransport, Transport};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Scripted byte-stream transport
///
/// Clones share state, so a test keeps one handle for injecting bytes and
/// inspecting writes while the code under test owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    /// Accept at most this many bytes per `send` call
    write_limit: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Bytes injected but not yet consumed
    pub fn pending_read(&self) -> usize {
        self.inner.lock().read_buffer.len()
    }

    /// Simulate a congested link accepting only `limit` bytes per send
    pub fn limit_writes(&self, limit: usize) {
        self.inner.lock().write_limit = Some(limit);
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let accepted = inner.write_limit.map_or(data.len(), |l| l.min(data.len()));
        inner.write_buffer.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    fn receive(&mut self, buffer: &mut Vec<u8>, length: usize) -> Result<usize> {
        let mut inner = self.inner.lock();
        let available = inner.read_buffer.len().min(length);
        buffer.clear();
        buffer.extend(inner.read_buffer.drain(..available));
        Ok(available)
    }
}

/// Hands out pre-scripted [`MockTransport`]s, failing once they run out
#[derive(Clone, Default)]
pub struct MockConnector {
    transports: Arc<Mutex<VecDeque<MockTransport>>>,
    attempts: Arc<Mutex<usize>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport for the next successful connect
    pub fn push(&self, transport: MockTransport) {
        self.transports.lock().push_back(transport);
    }

    /// Number of connect attempts so far, successful or not
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self) -> Result<MockTransport> {
        *self.attempts.lock() += 1;
        self.transports
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Network("connection refused".to_string()))
    }
}

/// Scripted datagram transport
#[derive(Clone, Default)]
pub struct MockDatagramTransport {
    inner: Arc<Mutex<MockDatagramInner>>,
}

#[derive(Default)]
struct MockDatagramInner {
    incoming: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl MockDatagramTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a datagram to be received
    pub fn inject(&self, datagram: &[u8]) {
        self.inner.lock().incoming.push_back(datagram.to_vec());
    }

    /// All datagrams sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().sent.clone()
    }
}

impl DatagramTransport for MockDatagramTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.lock().sent.push(data.to_vec());
        Ok(data.len())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>> {
        let next = self.inner.lock().incoming.pop_front();
        match next {
            Some(datagram) => {
                // Oversized datagrams are truncated like a real socket would
                let n = datagram.len().min(buffer.len());
                buffer[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            None => {
                thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }
}
