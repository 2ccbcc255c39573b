//! ACNET bus session over the acnetd TCP gateway.
//!
//! This is the layer everything else talks to. Open a [`BusSession`],
//! resolve node names and send requests to `TASK@NODE` destinations; replies
//! come back through [`ReplyStream`]s. The session reconnects on its own and
//! closes every open stream with `NOCON` when the link drops.

pub mod command;
pub mod config;
pub mod error;
pub mod handshake;
pub mod rad50;
pub mod reply;
pub mod session;
pub mod status;

#[cfg(feature = "test-util")]
pub mod testing;

pub use config::SessionConfig;
pub use error::{AcnetError, Result};
pub use handshake::handshake;
pub use reply::{Reply, ReplyStream};
pub use session::{split_destination, BusSession};
pub use status::Status;
