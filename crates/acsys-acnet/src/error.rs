use crate::status::Status;

/// Errors that can occur in bus session operations.
#[derive(Debug, thiserror::Error)]
pub enum AcnetError {
    /// ACNET status raised by the gateway, a remote task, or the session
    /// itself (`NOCON` for a lost or missing connection).
    #[error("ACNET status {0}")]
    Status(Status),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] acsys_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] acsys_frame::FrameError),

    /// The gateway rejected or garbled the connect exchange.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A request destination was not of the form `TASK@NODE`.
    #[error("invalid destination '{0}' (expected TASK@NODE)")]
    InvalidDestination(String),
}

impl AcnetError {
    /// The ACNET status equivalent of this error.
    ///
    /// Connection-level failures all read as `NOCON`.
    pub fn status(&self) -> Status {
        match self {
            AcnetError::Status(status) => *status,
            AcnetError::InvalidDestination(_) => Status::REQPACK,
            AcnetError::Transport(_) | AcnetError::Frame(_) | AcnetError::HandshakeFailed(_) => {
                Status::NOCON
            }
        }
    }
}

impl From<Status> for AcnetError {
    fn from(status: Status) -> Self {
        AcnetError::Status(status)
    }
}

pub type Result<T> = std::result::Result<T, AcnetError>;
