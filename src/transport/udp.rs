//! UDP transport implementation

use super::DatagramTransport;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Poll interval for `receive`; keeps scan loops responsive to their deadline
const POLL_INTERVAL_MS: u64 = 100;

/// Broadcast-capable UDP transport sending to a fixed target
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port and aim at `address:port`
    pub fn open(address: &str, port: u16) -> Result<Self> {
        let target = (address, port)
            .to_socket_addrs()
            .map_err(|e| Error::Network(format!("Cannot resolve {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::Network(format!("No address for {}", address)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| Error::Network(format!("Failed to create UDP socket: {}", e)))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(Duration::from_millis(POLL_INTERVAL_MS)))?;

        log::debug!(
            "UDP socket bound to {:?}, target {}",
            socket.local_addr().ok(),
            target
        );
        Ok(Self { socket, target })
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.socket.send_to(data, self.target)?)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buffer) {
            Ok((n, from)) => {
                log::trace!("Received {} byte datagram from {}", n, from);
                Ok(Some(n))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
