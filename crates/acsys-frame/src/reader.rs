use std::io::{ErrorKind, Read};

use acsys_transport::BusStream;
use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are buffered; callers always get whole frames, in arrival
/// order, so an ACK is never reordered against the DATA around it.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl FrameReader<BusStream> {
    /// Create a frame reader for `BusStream` and apply read timeout from config.
    pub fn with_config_bus(inner: BusStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Change the read timeout, e.g. once the handshake has completed.
    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.config.read_timeout = timeout;
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_frame_error)
    }
}

pub(crate) fn transport_to_frame_error(err: acsys_transport::TransportError) -> FrameError {
    match err {
        acsys_transport::TransportError::Io(io) => FrameError::Io(io),
        acsys_transport::TransportError::Resolve { source, .. }
        | acsys_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::{TcpListener, TcpStream};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::msg_type::{ACK, DATA};
    use crate::reply::ReplyHeader;

    fn wire(frames: &[(u16, &[u8])]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for (msg_type, payload) in frames {
            encode_frame(*msg_type, payload, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn ack_and_data_keep_arrival_order() {
        let bytes = wire(&[(ACK, b"\x00\x01"), (DATA, b"first"), (DATA, b"second")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let types: Vec<(u16, Vec<u8>)> = (0..3)
            .map(|_| {
                let frame = reader.read_frame().unwrap();
                (frame.msg_type, frame.payload.to_vec())
            })
            .collect();
        assert_eq!(
            types,
            vec![
                (ACK, b"\x00\x01".to_vec()),
                (DATA, b"first".to_vec()),
                (DATA, b"second".to_vec())
            ]
        );
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn reply_header_survives_one_byte_reads() {
        let header = ReplyHeader {
            flags: 0,
            status: 1,
            trunk: 9,
            node: 0x21,
            request_id: 7,
            length: 20,
        };
        let mut payload = BytesMut::new();
        header.encode(&mut payload);
        payload.put_slice(b"ok");
        let bytes = wire(&[(DATA, &payload)]);

        let mut reader = FrameReader::new(Trickle::new(bytes, 1));
        let frame = reader.read_frame().unwrap();

        let (parsed, body) = ReplyHeader::split(frame.payload).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(body.as_ref(), b"ok");
    }

    #[test]
    fn interrupted_read_is_retried() {
        let bytes = wire(&[(ACK, b"ok")]);
        let mut trickle = Trickle::new(bytes, 64);
        trickle.interrupt_first = true;

        let frame = FrameReader::new(trickle).read_frame().unwrap();
        assert_eq!(frame.msg_type, ACK);
    }

    #[test]
    fn eof_before_and_inside_a_frame() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));

        let mut partial = BytesMut::new();
        partial.put_u32(20);
        partial.put_u16(DATA);
        partial.put_slice(b"short");
        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn length_above_limit_is_rejected_before_payload_arrives() {
        let mut header = BytesMut::new();
        header.put_u32(1026);
        header.put_u16(DATA);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(header.to_vec()), cfg);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::PayloadTooLarge { size: 1024, max: 16 }
        ));
    }

    #[test]
    fn bus_stream_reader_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let gateway = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = crate::writer::FrameWriter::new(stream);
            writer.send(DATA, b"reply").unwrap();
        });

        let stream = BusStream::from_tcp(TcpStream::connect(addr).unwrap()).unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_secs(5)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_bus(stream, cfg).unwrap();
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.msg_type, DATA);
        assert_eq!(frame.payload.as_ref(), b"reply");

        reader.set_read_timeout(None).unwrap();
        gateway.join().unwrap();
    }

    /// Hands out at most `chunk` bytes per read.
    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
        chunk: usize,
        interrupt_first: bool,
    }

    impl Trickle {
        fn new(bytes: Vec<u8>, chunk: usize) -> Self {
            Self {
                bytes,
                pos: 0,
                chunk,
                interrupt_first: false,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if std::mem::take(&mut self.interrupt_first) {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len()).min(self.chunk);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
