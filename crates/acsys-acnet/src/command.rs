//! acnetd command encodings and their acknowledgments.
//!
//! Commands travel in [`COMMAND`](acsys_frame::COMMAND) frames. All fields are
//! big-endian; every command starts with the command code, the connection
//! handle and a (always zero) virtual node.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::status::Status;

/// Literal preamble selecting the raw TCP protocol on acnetd.
pub const PREAMBLE: &[u8; 7] = b"RAW\r\n\r\n";

pub const CMD_CONNECT: u16 = 1;
pub const CMD_NAME_LOOKUP: u16 = 11;
pub const CMD_SEND_REQUEST: u16 = 18;

/// Request flag asking for multiple replies.
pub const REQ_MULTIPLE: u16 = 1;

/// A command sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Open an ACNET connection; the gateway assigns the handle.
    Connect,
    /// Translate a RAD50 node name into a trunk/node value.
    NameLookup { handle: u32, name: u32 },
    /// Send a request to `task` on `node`.
    SendRequest {
        handle: u32,
        task: u32,
        node: u16,
        multiple: bool,
        timeout_ms: u32,
        data: &'a [u8],
    },
}

impl Command<'_> {
    pub fn code(&self) -> u16 {
        match self {
            Command::Connect => CMD_CONNECT,
            Command::NameLookup { .. } => CMD_NAME_LOOKUP,
            Command::SendRequest { .. } => CMD_SEND_REQUEST,
        }
    }

    /// Encode the command as a COMMAND frame payload.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u16(self.code());

        match self {
            Command::Connect => {
                buf.put_u32(0);
                buf.put_u32(0);
                buf.put_i32(0); // pid
                buf.put_u16(0); // data port
            }
            Command::NameLookup { handle, name } => {
                buf.put_u32(*handle);
                buf.put_u32(0);
                buf.put_u32(*name);
            }
            Command::SendRequest {
                handle,
                task,
                node,
                multiple,
                timeout_ms,
                data,
            } => {
                buf.reserve(data.len());
                buf.put_u32(*handle);
                buf.put_u32(0);
                buf.put_u32(*task);
                buf.put_u16(*node);
                buf.put_u16(if *multiple { REQ_MULTIPLE } else { 0 });
                buf.put_u32(*timeout_ms);
                buf.put_slice(data);
            }
        }

        buf.freeze()
    }
}

/// Check an acknowledgment status. Zero and non-fatal values pass.
pub fn check_ack_status(raw: i16) -> Result<()> {
    if raw == 0 {
        return Ok(());
    }
    let status = Status::from_raw(raw);
    if status.is_fatal() {
        return Err(status.into());
    }
    Ok(())
}

fn ensure_len(ack: &[u8], needed: usize) -> Result<()> {
    if ack.len() < needed {
        return Err(Status::RPLYPACK.into());
    }
    Ok(())
}

/// Acknowledgment of [`Command::Connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAck {
    pub status: i16,
    pub node: u8,
    pub handle: u32,
}

impl ConnectAck {
    pub const SIZE: usize = 9;

    pub fn parse(mut ack: &[u8]) -> Result<Self> {
        ensure_len(ack, Self::SIZE)?;
        let _code = ack.get_i16();
        Ok(Self {
            status: ack.get_i16(),
            node: ack.get_u8(),
            handle: ack.get_u32(),
        })
    }
}

/// Acknowledgment of [`Command::NameLookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAck {
    pub status: i16,
    pub node: u16,
}

impl NodeAck {
    pub const SIZE: usize = 6;

    pub fn parse(mut ack: &[u8]) -> Result<Self> {
        ensure_len(ack, Self::SIZE)?;
        let _code = ack.get_i16();
        Ok(Self {
            status: ack.get_i16(),
            node: ack.get_u16(),
        })
    }
}

/// Acknowledgment of [`Command::SendRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAck {
    pub status: i16,
    pub request_id: u16,
}

impl RequestAck {
    pub const SIZE: usize = 6;

    pub fn parse(mut ack: &[u8]) -> Result<Self> {
        ensure_len(ack, Self::SIZE)?;
        let _code = ack.get_i16();
        Ok(Self {
            status: ack.get_i16(),
            request_id: ack.get_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcnetError;

    #[test]
    fn connect_encodes_to_sixteen_bytes() {
        let payload = Command::Connect.encode();
        // Together with the type field this is the 18-byte connect frame.
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[..2], &[0, 1]);
        assert!(payload[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn name_lookup_layout() {
        let payload = Command::NameLookup {
            handle: 0x0102_0304,
            name: 0xAABB_CCDD,
        }
        .encode();
        assert_eq!(
            payload.as_ref(),
            &[0, 11, 1, 2, 3, 4, 0, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn send_request_layout() {
        let payload = Command::SendRequest {
            handle: 7,
            task: 0x0000_0010,
            node: 0x0921,
            multiple: true,
            timeout_ms: 2000,
            data: b"xy",
        }
        .encode();

        assert_eq!(payload.len(), 22 + 2);
        assert_eq!(&payload[0..2], &[0, 18]);
        assert_eq!(&payload[2..6], &[0, 0, 0, 7]);
        assert_eq!(&payload[10..14], &[0, 0, 0, 0x10]);
        assert_eq!(&payload[14..16], &[0x09, 0x21]);
        assert_eq!(&payload[16..18], &[0, 1]);
        assert_eq!(&payload[18..22], &2000u32.to_be_bytes());
        assert_eq!(&payload[22..], b"xy");
    }

    #[test]
    fn single_request_clears_multiple_flag() {
        let payload = Command::SendRequest {
            handle: 0,
            task: 0,
            node: 0,
            multiple: false,
            timeout_ms: 0,
            data: &[],
        }
        .encode();
        assert_eq!(&payload[16..18], &[0, 0]);
    }

    #[test]
    fn parses_acks() {
        let connect = ConnectAck::parse(&[0, 1, 0, 0, 0x2A, 0, 0, 0x12, 0x34]).unwrap();
        assert_eq!(
            connect,
            ConnectAck {
                status: 0,
                node: 0x2A,
                handle: 0x1234
            }
        );

        let node = NodeAck::parse(&[0, 11, 0, 0, 0x09, 0x21]).unwrap();
        assert_eq!(node.node, 0x0921);

        let request = RequestAck::parse(&[0, 18, 0, 0, 0x00, 0x05]).unwrap();
        assert_eq!(request.request_id, 5);
    }

    #[test]
    fn short_ack_is_rplypack() {
        let err = RequestAck::parse(&[0, 18, 0]).unwrap_err();
        assert!(matches!(err, AcnetError::Status(s) if s == Status::RPLYPACK));
    }

    #[test]
    fn ack_status_rules() {
        assert!(check_ack_status(0).is_ok());
        assert!(check_ack_status(Status::PEND.raw()).is_ok());
        let err = check_ack_status(Status::NOREMMEM.raw()).unwrap_err();
        assert_eq!(err.status(), Status::NOREMMEM);
    }
}
