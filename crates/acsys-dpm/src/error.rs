use acsys_acnet::{AcnetError, Status};

/// Errors that can occur in list operations.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// Bus-level failure or a fatal status from the list service.
    #[error(transparent)]
    Acnet(#[from] AcnetError),

    /// The list service answered with a different message than expected.
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    /// A setting named a tag that is not in the list.
    #[error("no list entry with tag {0}")]
    NoEntry(u32),
}

impl ListError {
    /// The ACNET status equivalent of this error.
    pub fn status(&self) -> Status {
        match self {
            ListError::Acnet(err) => err.status(),
            ListError::UnexpectedReply { .. } => Status::RPLYPACK,
            ListError::NoEntry(_) => Status::REQPACK,
        }
    }
}

impl From<Status> for ListError {
    fn from(status: Status) -> Self {
        ListError::Acnet(AcnetError::Status(status))
    }
}

pub type Result<T> = std::result::Result<T, ListError>;

/// A list-protocol message could not be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message body was empty.
    #[error("empty message")]
    Empty,

    /// The message body is not a valid list-protocol message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
