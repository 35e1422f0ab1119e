//! Transport layer for I/O abstraction
//!
//! The protocol layers only ever see these two traits. Short counts are
//! reported as counts, not errors: it is up to the caller to decide that a
//! frame is lost when fewer bytes than requested came back.

use crate::error::Result;

mod tcp;
mod udp;
pub use tcp::{TcpConnector, TcpTransport};
pub use udp::UdpTransport;

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockDatagramTransport, MockTransport};

/// Reliable byte-stream transport (control channel and frame stream)
pub trait Transport: Send {
    /// Send the whole buffer, returns number of bytes accepted
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Read exactly `length` bytes into `buffer`
    ///
    /// The buffer is replaced by whatever was read. Returns the number of
    /// bytes actually read, which is less than `length` if the peer closed
    /// the connection or the read timed out.
    fn receive(&mut self, buffer: &mut Vec<u8>, length: usize) -> Result<usize>;
}

/// Unreliable datagram transport (AutoIP discovery)
pub trait DatagramTransport: Send {
    /// Send one datagram, returns number of bytes sent
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buffer`
    ///
    /// Returns `None` when nothing arrived within the transport's poll
    /// interval.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>>;
}

/// Factory for fresh stream connections
///
/// Used by components that must reconnect on their own after link loss.
pub trait Connector: Send {
    type Transport: Transport;

    fn connect(&mut self) -> Result<Self::Transport>;
}
