use std::time::Duration;

use acsys_frame::FrameConfig;
use acsys_transport::GatewayAddr;

/// Tunables for a [`BusSession`](crate::BusSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// acnetd gateway to connect to.
    pub gateway: GatewayAddr,
    /// Bound on the TCP connect itself. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Read/write timeout while the connect exchange is in flight.
    pub handshake_timeout: Duration,
    /// How long a command waits for its acknowledgment.
    pub ack_timeout: Duration,
    /// How long an operation issued before the session is live waits for it.
    pub connect_wait: Duration,
    /// Pause between reconnect attempts.
    pub reconnect_backoff: Duration,
    /// Undrained replies one request id may hold before its stream is
    /// closed with `NOLCLMEM`.
    pub max_pending_replies: usize,
    /// Frame limits and socket timeouts once connected.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayAddr::default(),
            connect_timeout: Some(Duration::from_secs(5)),
            handshake_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(2),
            connect_wait: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(2),
            max_pending_replies: 65_536,
            frame: FrameConfig {
                write_timeout: Some(Duration::from_secs(2)),
                ..FrameConfig::default()
            },
        }
    }
}

impl SessionConfig {
    /// Default configuration pointed at `gateway`.
    pub fn for_gateway(gateway: GatewayAddr) -> Self {
        Self {
            gateway,
            ..Self::default()
        }
    }
}
