//! TCP transport implementation

use super::{Connector, Transport};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Blocking TCP transport for the control channel and frame stream
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to `address` (e.g., "192.168.1.10:2122")
    ///
    /// `timeout` bounds the connect itself and every subsequent read/write.
    pub fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let peer = address
            .to_socket_addrs()
            .map_err(|e| Error::Network(format!("Cannot resolve {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::Network(format!("No address for {}", address)))?;

        let stream =
            TcpStream::connect_timeout(&peer, timeout).map_err(|e| connect_error(peer, e))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY on {}: {}", peer, e);
        }

        log::info!("Connected to {}", peer);
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(written)
    }

    fn receive(&mut self, buffer: &mut Vec<u8>, length: usize) -> Result<usize> {
        buffer.clear();
        buffer.resize(length, 0);

        let mut filled = 0;
        while filled < length {
            match self.stream.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => break,
                Err(e) => {
                    buffer.truncate(filled);
                    return Err(e.into());
                }
            }
        }

        buffer.truncate(filled);
        Ok(filled)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Opens a new [`TcpTransport`] to a fixed address on every call
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&mut self) -> Result<TcpTransport> {
        TcpTransport::connect(&self.address, self.timeout)
    }
}

/// Unanswered connects become [`Error::Timeout`], refusals [`Error::Network`]
fn connect_error(peer: SocketAddr, e: std::io::Error) -> Error {
    if is_timeout(&e) {
        log::debug!("Connect to {} timed out", peer);
        Error::Timeout
    } else {
        Error::Network(format!("Connect to {} failed: {}", peer, e))
    }
}
