//! AutoIP datagram layout
//!
//! Discover request and reply share a 16-byte header:
//!
//! ```text
//! ┌─────┬──────┬─────────────┬──────────────┬────────────────┬──────┐
//! │ CMD │ rsvd │ Payload len │ MAC          │ Transaction ID │ rsvd │
//! │ u8  │ u8   │ u16 BE      │ 6 bytes      │ 4 bytes        │ 2    │
//! └─────┴──────┴─────────────┴──────────────┴────────────────┴──────┘
//!   0     1      2             4              10               14
//! ```
//!
//! Replies carry `payload len` bytes of XML after the header. The
//! transaction id is written and read in host byte order: only this
//! process ever interprets it.

use thiserror::Error;

/// Discover request command
pub const CMD_DISCOVER: u8 = 0x10;
/// Discover reply command
pub const CMD_DISCOVER_REPLY: u8 = 0x90;
/// Header size shared by request and reply
pub const HEADER_SIZE: usize = 16;
/// Receive buffer size
pub const MAX_DATAGRAM_SIZE: usize = 1400;

const OFFSET_PAYLOAD_LEN: usize = 2;
const OFFSET_MAC: usize = 4;
const OFFSET_TRANSACTION_ID: usize = 10;

/// Build the broadcast discover request
pub fn discover_request(transaction_id: u32) -> [u8; HEADER_SIZE] {
    let mut packet = [0u8; HEADER_SIZE];
    packet[0] = CMD_DISCOVER;
    // Reserved byte and zero payload length stay 0
    packet[OFFSET_MAC..OFFSET_TRANSACTION_ID].fill(0xFF);
    packet[OFFSET_TRANSACTION_ID..OFFSET_TRANSACTION_ID + 4]
        .copy_from_slice(&transaction_id.to_ne_bytes());
    packet
}

/// Why a datagram was not accepted as a discover reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("datagram too short ({0} bytes)")]
    TooShort(usize),

    #[error("unexpected command {0:#04x}")]
    NotAReply(u8),
}

/// Accepted reply header plus its payload, if complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<'a> {
    pub transaction_id: u32,
    pub declared_len: usize,
    /// `None` when the datagram is shorter than the declared payload
    pub payload: Option<&'a [u8]>,
}

/// Parse a received datagram
pub fn parse_reply(datagram: &[u8]) -> Result<Reply<'_>, ReplyError> {
    if datagram.len() < HEADER_SIZE {
        return Err(ReplyError::TooShort(datagram.len()));
    }
    if datagram[0] != CMD_DISCOVER_REPLY {
        return Err(ReplyError::NotAReply(datagram[0]));
    }

    let declared_len =
        u16::from_be_bytes([datagram[OFFSET_PAYLOAD_LEN], datagram[OFFSET_PAYLOAD_LEN + 1]])
            as usize;
    let transaction_id = u32::from_ne_bytes([
        datagram[OFFSET_TRANSACTION_ID],
        datagram[OFFSET_TRANSACTION_ID + 1],
        datagram[OFFSET_TRANSACTION_ID + 2],
        datagram[OFFSET_TRANSACTION_ID + 3],
    ]);

    Ok(Reply {
        transaction_id,
        declared_len,
        payload: datagram.get(HEADER_SIZE..HEADER_SIZE + declared_len),
    })
}
