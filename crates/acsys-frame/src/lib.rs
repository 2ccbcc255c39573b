//! Length-prefixed framing for the acnetd TCP protocol.
//!
//! Every message on the gateway stream is framed with:
//! - A 4-byte big-endian length (covering the type field and the payload)
//! - A 2-byte big-endian message type
//!
//! DATA frames additionally carry an 18-byte reply header, parsed by
//! [`ReplyHeader`]. No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod msg_type;
pub mod reader;
pub mod reply;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use msg_type::{ACK, COMMAND, DATA};
pub use reader::FrameReader;
pub use reply::{ReplyHeader, REPLY_HEADER_SIZE};
pub use writer::FrameWriter;
