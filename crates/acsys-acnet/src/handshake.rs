use std::io::{Read, Write};

use acsys_frame::{msg_type, FrameReader, FrameWriter, ACK, COMMAND};
use tracing::debug;

use crate::command::{Command, ConnectAck, PREAMBLE};
use crate::error::{AcnetError, Result};
use crate::status::Status;

/// Perform the client side of the acnetd connect exchange.
///
/// Sends the raw-protocol preamble and a connect command, then reads the
/// gateway's acknowledgment, which carries the connection handle.
pub fn handshake<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> Result<ConnectAck> {
    writer.send_raw(PREAMBLE)?;
    writer.send(COMMAND, &Command::Connect.encode())?;

    let frame = reader.read_frame()?;
    if frame.msg_type != ACK {
        return Err(AcnetError::HandshakeFailed(format!(
            "expected ACK, gateway sent {} ({})",
            msg_type::type_name(frame.msg_type),
            frame.msg_type
        )));
    }

    let ack = ConnectAck::parse(&frame.payload).map_err(|_| {
        AcnetError::HandshakeFailed(format!(
            "connect ack too short ({} bytes)",
            frame.payload.len()
        ))
    })?;

    if ack.status != 0 && Status::from_raw(ack.status).is_fatal() {
        return Err(AcnetError::HandshakeFailed(format!(
            "gateway refused connection: {}",
            Status::from_raw(ack.status)
        )));
    }

    debug!(handle = ack.handle, node = ack.node, "handshake complete");
    Ok(ack)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use acsys_frame::{decode_frame, encode_frame, DATA};
    use bytes::{BufMut, BytesMut};

    use super::*;

    fn gateway_reply(msg_type: u16, payload: &[u8]) -> FrameReader<Cursor<Vec<u8>>> {
        let mut wire = BytesMut::new();
        encode_frame(msg_type, payload, &mut wire).unwrap();
        FrameReader::new(Cursor::new(wire.to_vec()))
    }

    fn connect_ack(status: i16, node: u8, handle: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_i16(0);
        buf.put_i16(status);
        buf.put_u8(node);
        buf.put_u32(handle);
        buf.to_vec()
    }

    #[test]
    fn sends_preamble_then_connect_frame() {
        let mut reader = gateway_reply(ACK, &connect_ack(0, 3, 99));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let ack = handshake(&mut reader, &mut writer).unwrap();
        assert_eq!(ack.handle, 99);
        assert_eq!(ack.node, 3);

        let sent = writer.into_inner().into_inner();
        assert_eq!(&sent[..7], PREAMBLE);
        // 18-byte connect frame: length field reads 18.
        assert_eq!(&sent[7..11], &18u32.to_be_bytes());

        let mut rest = BytesMut::from(&sent[7..]);
        let frame = decode_frame(&mut rest, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.msg_type, COMMAND);
        assert_eq!(frame.payload, Command::Connect.encode());
    }

    #[test]
    fn rejects_non_ack_reply() {
        let mut reader = gateway_reply(DATA, &connect_ack(0, 3, 99));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let err = handshake(&mut reader, &mut writer).unwrap_err();
        assert!(matches!(err, AcnetError::HandshakeFailed(_)));
    }

    #[test]
    fn rejects_fatal_connect_status() {
        let mut reader = gateway_reply(ACK, &connect_ack(Status::NOREMMEM.raw(), 3, 99));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let err = handshake(&mut reader, &mut writer).unwrap_err();
        assert!(matches!(err, AcnetError::HandshakeFailed(_)));
    }

    #[test]
    fn rejects_short_ack() {
        let mut reader = gateway_reply(ACK, &[0, 0, 0]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let err = handshake(&mut reader, &mut writer).unwrap_err();
        assert!(matches!(err, AcnetError::HandshakeFailed(_)));
    }

    #[test]
    fn eof_before_ack_is_frame_error() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        let err = handshake(&mut reader, &mut writer).unwrap_err();
        assert!(matches!(
            err,
            AcnetError::Frame(acsys_frame::FrameError::ConnectionClosed)
        ));
    }
}
