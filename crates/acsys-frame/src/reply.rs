use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the ACNET header at the front of every DATA frame payload.
pub const REPLY_HEADER_SIZE: usize = 18;

/// ACNET header of a reply delivered in a DATA frame.
///
/// acnetd forwards the header in network-native (little-endian) order:
/// ```text
/// 0..2   flags
/// 2..4   status        (i16)
/// 4      trunk         (replier)
/// 5      node          (replier)
/// 6..14  reserved
/// 14..16 request id
/// 16..18 message length
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub flags: u16,
    pub status: i16,
    pub trunk: u8,
    pub node: u8,
    pub request_id: u16,
    pub length: u16,
}

impl ReplyHeader {
    /// Parse the header from the front of a DATA frame payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < REPLY_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: REPLY_HEADER_SIZE,
                got: payload.len(),
            });
        }

        Ok(Self {
            flags: u16::from_le_bytes([payload[0], payload[1]]),
            status: i16::from_le_bytes([payload[2], payload[3]]),
            trunk: payload[4],
            node: payload[5],
            request_id: u16::from_le_bytes([payload[14], payload[15]]),
            length: u16::from_le_bytes([payload[16], payload[17]]),
        })
    }

    /// Split a DATA frame payload into its header and the reply body.
    pub fn split(payload: Bytes) -> Result<(Self, Bytes)> {
        let header = Self::parse(&payload)?;
        Ok((header, payload.slice(REPLY_HEADER_SIZE..)))
    }

    /// Trunk/node address of the replier.
    pub fn address(&self) -> u16 {
        (u16::from(self.trunk) << 8) | u16::from(self.node)
    }

    /// Append the wire form of this header.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(REPLY_HEADER_SIZE);
        dst.put_u16_le(self.flags);
        dst.put_i16_le(self.status);
        dst.put_u8(self.trunk);
        dst.put_u8(self.node);
        dst.put_bytes(0, 8);
        dst.put_u16_le(self.request_id);
        dst.put_u16_le(self.length);
    }
}
