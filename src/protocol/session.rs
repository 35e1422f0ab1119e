//! CoLa2 session handler
//!
//! Frames commands for the control channel, owns the session id assigned by
//! the device and the per-handler request counter, and unwraps responses.
//!
//! The protocol is not pipelined: one request is in flight at a time, so the
//! request counter only has to avoid repeating within that window. It is
//! pre-incremented (first request carries id 1) and wraps silently at 2^16.
//!
//! # Failure results
//!
//! | Condition                         | Result                        |
//! |-----------------------------------|-------------------------------|
//! | Short write, short read           | `Err(Error::Network)`         |
//! | Bad magic / absurd length         | `Ok(Command::empty())`        |
//! | Device fault                      | `Ok(cmd)` with type `FA`      |
//!
//! Nothing is retried here. Reconnect policy belongs to the owner.

use super::command::{Command, CommandBuilder, MARKER};
use super::header::{self, Cola2Header, LENGTH_OFFSET};
use crate::error::{Error, Result};
use crate::transport::Transport;
use std::time::{Duration, Instant};

/// Open-session subcommand
const CMD_OPEN_SESSION: [u8; 2] = [b'O', b'x'];
/// Close-session subcommand
const CMD_CLOSE_SESSION: [u8; 2] = [b'C', b'x'];
/// Client identifier sent with the open-session request
const DEFAULT_CLIENT_ID: &str = "Ex";
/// Client identifier is a flex string of at most 32 bytes
const MAX_CLIENT_ID_LEN: usize = 32;
/// Open-session response: 2-byte type tag followed by the session id
const SESSION_ID_OFFSET: usize = 2;
const MIN_SESSION_RESPONSE: u32 = 4;
/// Device-echoed header remnant in front of every response payload
const RESPONSE_ECHO_LEN: usize = 8;
/// Length fields above this are treated as desync, not allocated
const MAX_RESPONSE_SIZE: u32 = 16 * 1024 * 1024;
/// Variable read by [`SessionHandler::keep_alive`]
const KEEPALIVE_VARIABLE: &str = "DeviceIdent";

/// Session state owned by one handler
#[derive(Debug, Clone, Default)]
pub struct Session {
    session_id: u32,
    request_counter: u16,
    open: bool,
    timeout: Duration,
    last_activity: Option<Instant>,
}

impl Session {
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Id carried by the most recently sent frame
    pub fn request_counter(&self) -> u16 {
        self.request_counter
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Session timeout requested from the device
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the last successful exchange
    pub fn idle_for(&self) -> Option<Duration> {
        self.last_activity.map(|t| t.elapsed())
    }

    #[inline]
    fn next_request_id(&mut self) -> u16 {
        self.request_counter = self.request_counter.wrapping_add(1);
        self.request_counter
    }

    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    fn reset(&mut self) {
        self.session_id = 0;
        self.open = false;
        self.last_activity = None;
    }
}

/// CoLa2 protocol handler over a byte-stream transport
pub struct SessionHandler<T: Transport> {
    transport: T,
    session: Session,
    client_id: String,
    rx_buffer: Vec<u8>,
}

impl<T: Transport> SessionHandler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: Session::default(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            rx_buffer: Vec::with_capacity(256),
        }
    }

    /// Override the client identifier sent during the handshake
    ///
    /// Truncated to 32 bytes at a character boundary.
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        let mut end = client_id.len().min(MAX_CLIENT_ID_LEN);
        while !client_id.is_char_boundary(end) {
            end -= 1;
        }
        self.client_id = client_id[..end].to_string();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> u32 {
        self.session.session_id
    }

    fn next_header(&mut self) -> Cola2Header {
        let request_id = self.session.next_request_id();
        Cola2Header::new(self.session.session_id, request_id)
    }

    /// Perform the open-session handshake
    ///
    /// On failure the previous session id is left untouched.
    pub fn open_session(&mut self, timeout_s: u8) -> bool {
        match self.handshake(timeout_s) {
            Ok(session_id) => {
                self.session.session_id = session_id;
                self.session.open = true;
                self.session.timeout = Duration::from_secs(u64::from(timeout_s));
                self.session.touch();
                log::info!(
                    "Session opened: id={:#010x}, timeout={}s",
                    session_id,
                    timeout_s
                );
                true
            }
            Err(e) => {
                log::error!("Open session failed: {}", e);
                false
            }
        }
    }

    fn handshake(&mut self, timeout_s: u8) -> Result<u32> {
        // Session id is 0 until the device assigns one
        let request_id = self.session.next_request_id();
        let header = Cola2Header::new(0, request_id);

        let mut body = Vec::with_capacity(5 + self.client_id.len());
        body.extend_from_slice(&CMD_OPEN_SESSION);
        body.push(timeout_s);
        body.extend_from_slice(&(self.client_id.len() as u16).to_be_bytes());
        body.extend_from_slice(self.client_id.as_bytes());

        let frame = header::build_frame(&header, &body);
        self.send_frame(&frame)?;

        self.read_exact(4)?;
        if !header::is_magic(&self.rx_buffer) {
            return Err(Error::SessionRejected(format!(
                "bad magic {:02X?}",
                self.rx_buffer
            )));
        }

        self.read_exact(4)?;
        let length = header::read_u32_be(&self.rx_buffer, 0).unwrap_or(0);
        if length < MIN_SESSION_RESPONSE {
            return Err(Error::SessionRejected(format!(
                "response too short ({} bytes)",
                length
            )));
        }
        if length > MAX_RESPONSE_SIZE {
            return Err(Error::SessionRejected(format!(
                "response length {} out of range",
                length
            )));
        }

        self.read_exact(length as usize)?;
        header::read_u32_be(&self.rx_buffer, SESSION_ID_OFFSET).ok_or_else(|| {
            Error::SessionRejected(format!(
                "{} byte response carries no session id",
                self.rx_buffer.len()
            ))
        })
    }

    /// Tear the session down on the device side
    ///
    /// Sends a close-session frame and waits (best effort) for the
    /// acknowledgement. The local session is reset whatever the outcome.
    pub fn close_session(&mut self) {
        if !self.session.open {
            return;
        }

        let session_id = self.session.session_id;
        let header = self.next_header();
        let frame = header::build_frame(&header, &CMD_CLOSE_SESSION);

        let acknowledged = self.send_frame(&frame).and_then(|_| self.read_response());
        match acknowledged {
            Ok(Some(_)) => log::info!("Session {:#010x} closed", session_id),
            Ok(None) => log::warn!(
                "Session {:#010x} closed locally, device answer was garbled",
                session_id
            ),
            Err(e) => log::warn!(
                "Session {:#010x} closed locally, device not reachable: {}",
                session_id,
                e
            ),
        }

        self.session.reset();
    }

    /// Send a command and return the device's answer
    ///
    /// `Err` only for link failures; a desynchronised answer comes back as
    /// [`Command::empty`].
    pub fn send(&mut self, cmd: &Command) -> Result<Command> {
        let bytes = cmd.as_bytes();
        if bytes.is_empty() {
            return Err(Error::InvalidPacket("cannot send an empty command".into()));
        }

        let header = self.next_header();
        // Marker byte is CoLa-B framing, not used by CoLa2
        let frame = header::build_frame(&header, &bytes[1..]);
        log::trace!(
            "TX req={} len={} xor={:#04x}",
            header.request_id,
            frame.len(),
            header::xor_checksum(&frame)
        );
        self.send_frame(&frame)?;

        let Some(mut payload) = self.read_response()? else {
            return Ok(Command::empty());
        };

        if payload.len() > RESPONSE_ECHO_LEN {
            payload.drain(..RESPONSE_ECHO_LEN);
        }
        payload.insert(0, MARKER);
        self.session.touch();

        let response = Command::new(payload);
        if let Some(code) = response.error_code() {
            log::warn!("Device reported error {:#06x} for req={}", code, header.request_id);
        }
        Ok(response)
    }

    /// True when more than half the session timeout passed without traffic
    pub fn keepalive_due(&self) -> bool {
        if !self.session.open || self.session.timeout.is_zero() {
            return false;
        }
        self.session
            .idle_for()
            .is_some_and(|idle| idle >= self.session.timeout / 2)
    }

    /// Issue a cheap read if the session is about to expire
    ///
    /// Returns whether a request was sent.
    pub fn keep_alive(&mut self) -> Result<bool> {
        if !self.keepalive_due() {
            return Ok(false);
        }
        let cmd = CommandBuilder::read_variable(KEEPALIVE_VARIABLE).build();
        let response = self.send(&cmd)?;
        if !response.is_valid() {
            log::warn!("Keep-alive answer discarded (desync)");
        }
        log::debug!("Keep-alive sent for session {:#010x}", self.session.session_id);
        Ok(true)
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let sent = self
            .transport
            .send(frame)
            .map_err(|e| Error::Network(format!("send failed: {}", e)))?;
        if sent != frame.len() {
            return Err(Error::Network(format!(
                "short write: {} of {} bytes",
                sent,
                frame.len()
            )));
        }
        Ok(())
    }

    fn read_exact(&mut self, length: usize) -> Result<()> {
        let received = self
            .transport
            .receive(&mut self.rx_buffer, length)
            .map_err(|e| Error::Network(format!("receive failed: {}", e)))?;
        if received != length {
            return Err(Error::Network(format!(
                "short read: {} of {} bytes",
                received, length
            )));
        }
        Ok(())
    }

    /// Read magic, length and body. `None` on desync.
    fn read_response(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_exact(4)?;
        if !header::is_magic(&self.rx_buffer) {
            log::warn!("Response magic mismatch {:02X?}, dropping", self.rx_buffer);
            return Ok(None);
        }

        self.read_exact(4)?;
        let length = header::read_u32_be(&self.rx_buffer, 0).unwrap_or(0);
        if length > MAX_RESPONSE_SIZE {
            log::warn!("Response length {} out of range, dropping", length);
            return Ok(None);
        }

        self.read_exact(length as usize)?;
        log::trace!("RX len={}", LENGTH_OFFSET + self.rx_buffer.len());
        Ok(Some(std::mem::take(&mut self.rx_buffer)))
    }
}

impl<T: Transport> Drop for SessionHandler<T> {
    fn drop(&mut self) {
        self.close_session();
    }
}
