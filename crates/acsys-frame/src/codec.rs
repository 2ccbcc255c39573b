use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: length (4) + type (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Size of the type field, which the length prefix includes.
const TYPE_SIZE: usize = 2;

/// Default maximum payload size: 128 KiB, well above the largest ACNET message.
pub const DEFAULT_MAX_PAYLOAD: usize = 128 * 1024;

/// A framed gateway message.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Message type (see [`crate::msg_type`]).
    pub msg_type: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(msg_type: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬───────────┬─────────────────┐
/// │ Length (4B BE)   │ Type      │ Payload         │
/// │ = 2 + payload    │ (2B BE)   │                 │
/// └──────────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_frame(msg_type: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let max = u32::MAX as usize - TYPE_SIZE;
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32((payload.len() + TYPE_SIZE) as u32);
    dst.put_u16(msg_type);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    if (length as usize) < TYPE_SIZE {
        return Err(FrameError::InvalidLength(length));
    }
    let msg_type = u16::from_be_bytes([src[4], src[5]]);

    let payload_len = length as usize - TYPE_SIZE;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { msg_type, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 128 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
