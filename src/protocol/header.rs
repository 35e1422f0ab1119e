//! CoLa2 frame header
//!
//! Every frame on the control channel starts with a fixed 16-byte header:
//!
//! ```text
//! ┌──────────┬──────────┬─────┬─────┬────────────┬────────────┬──────────
//! │ Magic    │ Length   │ Hub │ NoC │ Session ID │ Request ID │ Body ...
//! │ 02020202 │ u32 BE   │ u8  │ u8  │ u32 BE     │ u16 BE     │
//! └──────────┴──────────┴─────┴─────┴────────────┴────────────┴──────────
//!   0          4          8     9     10           14           16
//! ```
//!
//! Length counts every byte after the length field itself, i.e. total frame
//! size minus 8. Hub counter and number-of-chunks are reserved and always 0.

/// Frame start marker
pub const MAGIC: [u8; 4] = [0x02, 0x02, 0x02, 0x02];

/// Size of the encoded header
pub const HEADER_SIZE: usize = 16;

/// Bytes preceding the part covered by the length field (magic + length)
pub const LENGTH_OFFSET: usize = 8;

const OFFSET_LENGTH: usize = 4;
const OFFSET_HUB_COUNTER: usize = 8;
const OFFSET_NUM_CHUNKS: usize = 9;
const OFFSET_SESSION_ID: usize = 10;
const OFFSET_REQUEST_ID: usize = 14;

/// Typed header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cola2Header {
    pub session_id: u32,
    pub request_id: u16,
}

impl Cola2Header {
    pub fn new(session_id: u32, request_id: u16) -> Self {
        Self {
            session_id,
            request_id,
        }
    }

    /// Serialize with a zero length field (patched once the body is known)
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&MAGIC);
        out[OFFSET_HUB_COUNTER] = 0;
        out[OFFSET_NUM_CHUNKS] = 0;
        write_u32_be(&mut out, OFFSET_SESSION_ID, self.session_id);
        write_u16_be(&mut out, OFFSET_REQUEST_ID, self.request_id);
        out
    }

    /// Parse the typed fields back out of an encoded frame
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() < HEADER_SIZE || frame[..4] != MAGIC {
            return None;
        }
        Some(Self {
            session_id: read_u32_be(frame, OFFSET_SESSION_ID)?,
            request_id: read_u16_be(frame, OFFSET_REQUEST_ID)?,
        })
    }
}

/// Assemble header + body and patch the length field
pub fn build_frame(header: &Cola2Header, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(body);
    let length = (frame.len() - LENGTH_OFFSET) as u32;
    write_u32_be(&mut frame, OFFSET_LENGTH, length);
    frame
}

/// Length field of an encoded frame
pub fn frame_length(frame: &[u8]) -> Option<u32> {
    read_u32_be(frame, OFFSET_LENGTH)
}

/// True if `bytes` is exactly the magic marker
#[inline]
pub fn is_magic(bytes: &[u8]) -> bool {
    bytes == MAGIC
}

/// XOR of every byte from offset 8 onward
///
/// Not part of the framing contract: neither appended to outbound frames nor
/// checked on inbound ones. Useful when comparing captured traffic.
pub fn xor_checksum(frame: &[u8]) -> u8 {
    frame
        .iter()
        .skip(LENGTH_OFFSET)
        .fold(0u8, |acc, &b| acc ^ b)
}

#[inline]
pub fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_u16_be(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
fn write_u32_be(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[inline]
fn write_u16_be(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = Cola2Header::new(0x1122_3344, 0xABCD);
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(bytes[8], 0);
        assert_eq!(bytes[9], 0);
        assert_eq!(&bytes[10..14], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(&bytes[14..16], &[0xAB, 0xCD]);
    }

    #[test]
    fn test_length_field_is_total_minus_eight() {
        for body_len in [0usize, 1, 7, 300] {
            let body = vec![0x5A; body_len];
            let frame = build_frame(&Cola2Header::new(7, 1), &body);
            assert_eq!(frame.len(), HEADER_SIZE + body_len);
            assert_eq!(frame_length(&frame), Some((frame.len() - 8) as u32));
            assert!(is_magic(&frame[..4]));
        }
    }

    #[test]
    fn test_decode() {
        let frame = build_frame(&Cola2Header::new(42, 9), b"RNname");
        assert_eq!(Cola2Header::decode(&frame), Some(Cola2Header::new(42, 9)));

        let mut corrupted = frame.clone();
        corrupted[0] = 0x03;
        assert_eq!(Cola2Header::decode(&corrupted), None);
        assert_eq!(Cola2Header::decode(&frame[..10]), None);
    }

    #[test]
    fn test_xor_checksum_skips_magic_and_length() {
        let frame = [0xFF, 0xFF, 0xFF, 0xFF, 0xEE, 0xEE, 0xEE, 0xEE, 0x01, 0x02, 0x04];
        assert_eq!(xor_checksum(&frame), 0x07);
        assert_eq!(xor_checksum(&frame[..8]), 0);
    }

    #[test]
    fn test_read_helpers_bounds() {
        assert_eq!(read_u32_be(&[1, 2, 3], 0), None);
        assert_eq!(read_u16_be(&[1, 2, 3], 1), Some(0x0203));
        assert_eq!(read_u16_be(&[1, 2, 3], 2), None);
    }
}
