use std::io::{ErrorKind, Write};

use acsys_transport::BusStream;
use bytes::BytesMut;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// Every send is flushed before it returns; a command is on the wire by the
/// time the caller starts waiting for its ACK.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a payload with the given message type.
    pub fn send(&mut self, msg_type: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(msg_type, payload, &mut self.buf)?;

        let encoded = std::mem::take(&mut self.buf);
        let result = self.write_all(&encoded);
        self.buf = encoded;
        result?;

        self.flush()
    }

    /// Send unframed bytes, used for the connection preamble.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    // A socket write timeout surfaces as WouldBlock/TimedOut and is returned
    // as an I/O error, never retried.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<BusStream> {
    /// Create a frame writer for `BusStream` and apply write timeout from config.
    pub fn with_config_bus(inner: BusStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_frame;
    use crate::msg_type::COMMAND;
    use crate::reader::FrameReader;

    fn sent(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn command_frame_layout() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(COMMAND, &[0, 11, 0xaa]).unwrap();

        assert_eq!(sent(writer), vec![0, 0, 0, 5, 0, 1, 0, 11, 0xaa]);
    }

    #[test]
    fn preamble_goes_out_unframed_before_commands() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send_raw(b"RAW\r\n\r\n").unwrap();
        writer.send(COMMAND, b"x").unwrap();
        writer.send(COMMAND, b"yz").unwrap();

        let bytes = sent(writer);
        assert_eq!(&bytes[..7], b"RAW\r\n\r\n");

        let mut reader = FrameReader::new(Cursor::new(bytes[7..].to_vec()));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"x");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"yz");
    }

    #[test]
    fn oversized_command_is_not_written() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);

        let err = writer.send(COMMAND, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn short_and_interrupted_writes_are_completed() {
        let mut writer = FrameWriter::new(Stubborn::default());
        writer.send(COMMAND, b"retry").unwrap();

        let stubborn = writer.into_inner();
        assert!(stubborn.flushed);
        let mut wire = BytesMut::from(stubborn.data.as_slice());
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"retry");
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(Closed);
        assert!(matches!(
            writer.send(COMMAND, b"x").unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    /// Interrupts every other call and accepts two bytes at a time.
    #[derive(Default)]
    struct Stubborn {
        data: Vec<u8>,
        calls: usize,
        flushed: bool,
    }

    impl Write for Stubborn {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(2);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.flushed = true;
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
