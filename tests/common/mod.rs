//! Test utilities for DrishtiIO integration tests.
//!
//! Builders for device-side byte sequences. Transports come from the
//! crate's `mock` feature.

#![allow(dead_code)]

use drishti_io::protocol::header::{self, MAGIC};
use drishti_io::transport::{MockConnector, MockTransport};

/// Magic + length + body, as the device frames every answer
pub fn device_frame(body: &[u8]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Open-session acceptance carrying `session_id`
pub fn session_accept(session_id: u32) -> Vec<u8> {
    let mut body = vec![b'O', b'A'];
    body.extend_from_slice(&session_id.to_be_bytes());
    device_frame(&body)
}

/// Command answer: echoed hub/noc/session/request bytes, then `payload`
pub fn answer(session_id: u32, request_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0, 0];
    body.extend_from_slice(&session_id.to_be_bytes());
    body.extend_from_slice(&request_id.to_be_bytes());
    body.extend_from_slice(payload);
    device_frame(&body)
}

/// Split a written byte sequence into whole CoLa2 frames
pub fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Some(length) = header::frame_length(bytes) {
        let total = header::LENGTH_OFFSET + length as usize;
        frames.push(bytes[..total].to_vec());
        bytes = &bytes[total..];
    }
    frames
}

/// AutoIP reply for `transaction_id` describing a sensor at `ip`
pub fn autoip_reply(transaction_id: u32, ip: &str, mac: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0"?><NetScanResult MACAddr="{mac}"><Item key="IPAddress" value="{ip}"/><Item key="IPMask" value="255.255.255.0"/><Item key="HostPortNo" value="2122"/><Item key="DeviceType" value="Visionary-S"/></NetScanResult>"#
    );
    let mut out = vec![0x90, 0];
    out.extend_from_slice(&(xml.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0x00, 0x06, 0x77, 0x10, 0x20, 0x30]);
    out.extend_from_slice(&transaction_id.to_ne_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(xml.as_bytes());
    out
}

/// Connector handing out one link per queued byte script
pub fn connector_with(links: &[MockTransport]) -> MockConnector {
    let connector = MockConnector::new();
    for link in links {
        connector.push(link.clone());
    }
    connector
}
