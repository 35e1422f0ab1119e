//! AutoIP device discovery
//!
//! One-shot, time-bounded broadcast scan:
//!
//! 1. Pick a random transaction id for this scan
//! 2. Broadcast a discover request carrying it
//! 3. Collect replies until the timeout elapses, keeping only those that
//!    echo our transaction id (others belong to concurrent scanners or are
//!    stale retransmissions)
//!
//! Malformed replies are skipped one by one and never abort the scan. The
//! result is in arrival order with duplicates kept.

pub mod packet;
mod xml;

pub use xml::parse_device_info;

use crate::error::Result;
use crate::transport::{DatagramTransport, UdpTransport};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Discovered device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub port: String,
    pub subnet: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{} (mask {}, MAC {})",
            self.device_name, self.ip_address, self.port, self.subnet, self.mac_address
        )
    }
}

/// Broadcast a discover request and collect replies for `timeout`
///
/// Fails only if the socket cannot be set up or the request cannot be sent.
pub fn scan(timeout: Duration, broadcast_address: &str, port: u16) -> Result<Vec<DeviceInfo>> {
    let transport = UdpTransport::open(broadcast_address, port)?;
    let transaction_id: u32 = rand::random();
    log::info!(
        "Scanning {}:{} for {:?} (transaction {:#010x})",
        broadcast_address,
        port,
        timeout,
        transaction_id
    );
    scan_with(transport, transaction_id, timeout)
}

/// Scan over an arbitrary datagram transport with a caller-chosen id
pub fn scan_with<D: DatagramTransport>(
    mut transport: D,
    transaction_id: u32,
    timeout: Duration,
) -> Result<Vec<DeviceInfo>> {
    transport.send(&packet::discover_request(transaction_id))?;

    let mut devices = Vec::new();
    let mut buffer = vec![0u8; packet::MAX_DATAGRAM_SIZE];
    let started = Instant::now();

    while started.elapsed() <= timeout {
        let len = match transport.receive(&mut buffer) {
            Ok(Some(len)) => len,
            Ok(None) => continue,
            Err(e) => {
                log::debug!("Discovery receive error: {}", e);
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let reply = match packet::parse_reply(&buffer[..len]) {
            Ok(reply) => reply,
            Err(e) => {
                log::trace!("Ignoring datagram: {}", e);
                continue;
            }
        };
        if reply.transaction_id != transaction_id {
            log::trace!(
                "Ignoring reply for transaction {:#010x}",
                reply.transaction_id
            );
            continue;
        }
        let Some(payload) = reply.payload else {
            log::error!(
                "Received invalid AutoIP packet: {} payload bytes declared, {} received",
                reply.declared_len,
                len - packet::HEADER_SIZE
            );
            continue;
        };

        match parse_device_info(payload) {
            Ok(device) => {
                log::debug!("Found {}", device);
                devices.push(device);
            }
            Err(e) => log::warn!("Skipping unparsable AutoIP reply: {}", e),
        }
    }

    log::info!("Scan finished: {} device(s)", devices.len());
    Ok(devices)
}
