//! Frame sources for the acquisition engine
//!
//! [`FrameStream`] is what the grabber drives: open, pull, check the link,
//! close. [`BlobStream`] is the concrete source for a sensor's data port.
//! It reconnects through a [`Connector`], so the same code runs against TCP
//! and against scripted transports.
//!
//! # Frame format
//!
//! ```text
//! ┌──────────┬──────────┬──────────────────────────┐
//! │ Magic    │ Length   │ Frame body (opaque)      │
//! │ 02020202 │ u32 BE   │ `length` bytes           │
//! └──────────┴──────────┴──────────────────────────┘
//! ```
//!
//! After a stray byte the reader slides forward one byte at a time until the
//! magic lines up again. No marker within `max_frame_size` bytes, a short
//! read or an oversized length drops the link instead.

use crate::error::{Error, Result};
use crate::protocol::header::{self, MAGIC};
use crate::transport::{Connector, Transport};
use std::time::{SystemTime, UNIX_EPOCH};

/// One decoded unit of sensor output
///
/// The body is opaque here; image decoding happens downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Per-stream counter, starting at 1 for the first frame received
    pub sequence: u64,
    /// Host receive time
    pub timestamp_us: u64,
    pub payload: Vec<u8>,
}

/// Source of frames driven by the grabber thread
pub trait FrameStream: Send + 'static {
    /// Establish (or re-establish) the link
    fn open(&mut self) -> Result<()>;

    /// Fill `frame` with the next complete frame
    ///
    /// On error the contents of `frame` are unspecified. Whether the error
    /// was fatal to the link is reported by [`FrameStream::is_connected`].
    fn next_frame(&mut self, frame: &mut Frame) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

/// Length-prefixed frame stream over a reconnectable transport
pub struct BlobStream<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
    max_frame_size: usize,
    sequence: u64,
    rx_buffer: Vec<u8>,
}

impl<C: Connector> BlobStream<C> {
    pub fn new(connector: C, max_frame_size: usize) -> Self {
        Self {
            connector,
            transport: None,
            max_frame_size,
            sequence: 0,
            rx_buffer: Vec::with_capacity(8),
        }
    }

    /// Drop the link after a failure that leaves the byte stream unusable
    fn disconnect(&mut self, reason: String) -> Error {
        self.transport = None;
        Error::Network(reason)
    }
}

impl<C> FrameStream for BlobStream<C>
where
    C: Connector + 'static,
    C::Transport: 'static,
{
    fn open(&mut self) -> Result<()> {
        self.transport = None;
        self.transport = Some(self.connector.connect()?);
        log::debug!("Frame stream opened");
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(Error::Network("frame stream not open".into()));
        };

        let skipped = match read_frame(transport, &mut self.rx_buffer, frame, self.max_frame_size)
        {
            Ok(skipped) => skipped,
            Err(reason) => return Err(self.disconnect(reason)),
        };
        if skipped > 0 {
            log::warn!("Frame stream resynchronised after {} stray bytes", skipped);
        }

        self.sequence += 1;
        frame.sequence = self.sequence;
        frame.timestamp_us = current_timestamp_us();
        log::trace!(
            "Frame {} received ({} bytes)",
            frame.sequence,
            frame.payload.len()
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn close(&mut self) {
        if self.transport.take().is_some() {
            log::debug!("Frame stream closed");
        }
    }
}

/// Read one frame, returns how many bytes preceded its marker
///
/// Any failure leaves the byte stream at an unknown position and is
/// reported as the reason to drop the link.
fn read_frame<T: Transport>(
    transport: &mut T,
    window: &mut Vec<u8>,
    frame: &mut Frame,
    max_frame_size: usize,
) -> std::result::Result<usize, String> {
    read_exact(transport, window, MAGIC.len(), "magic")?;

    // Slide byte by byte until the marker lines up again
    let mut skipped = 0;
    let mut next = Vec::with_capacity(1);
    while !header::is_magic(window) {
        if skipped >= max_frame_size {
            return Err(format!("no frame marker within {} bytes", skipped));
        }
        read_exact(transport, &mut next, 1, "resync")?;
        window.remove(0);
        window.push(next[0]);
        skipped += 1;
    }

    read_exact(transport, window, 4, "length")?;
    let length = header::read_u32_be(window, 0).unwrap_or(0) as usize;
    if length > max_frame_size {
        // Cannot skip what we will not buffer: resync by reconnecting
        return Err(format!(
            "frame length {} exceeds limit {}",
            length, max_frame_size
        ));
    }

    read_exact(transport, &mut frame.payload, length, "body")?;
    Ok(skipped)
}

fn read_exact<T: Transport>(
    transport: &mut T,
    buffer: &mut Vec<u8>,
    length: usize,
    what: &str,
) -> std::result::Result<(), String> {
    match transport.receive(buffer, length) {
        Ok(n) if n == length => Ok(()),
        Ok(n) => Err(format!("short read on {} ({} of {} bytes)", what, n, length)),
        Err(e) => Err(e.to_string()),
    }
}

fn current_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
