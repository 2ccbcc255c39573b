//! TCP transport to an ACNET gateway.
//!
//! This is the lowest layer of acsys. It opens the single TCP connection a
//! bus session runs over and hands out [`BusStream`] handles (one for the
//! reader thread, one for the command writer) that share the same socket.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::BusStream;
pub use tcp::{connect, connect_timeout, GatewayAddr, DEFAULT_GATEWAY};
