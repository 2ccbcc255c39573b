use std::fmt;
use std::io;

use acsys_acnet::{AcnetError, Status};
use acsys_dpm::ListError;
use acsys_frame::FrameError;
use acsys_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Exit code for an ACNET status raised by the bus or a remote task.
pub fn status_code(status: Status) -> i32 {
    match status {
        Status::NOCON => TRANSPORT_ERROR,
        Status::REQTMO => TIMEOUT,
        Status::REQPACK | Status::RPLYPACK => DATA_INVALID,
        _ => FAILURE,
    }
}

pub fn acnet_error(context: &str, err: AcnetError) -> CliError {
    match err {
        AcnetError::Status(status) => {
            let message = match status.name() {
                Some(name) => format!("{context}: {name} {status}"),
                None => format!("{context}: ACNET status {status}"),
            };
            CliError::new(status_code(status), message)
        }
        AcnetError::Transport(err) => transport_error(context, err),
        AcnetError::Frame(err) => frame_error(context, err),
        AcnetError::HandshakeFailed(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        AcnetError::InvalidDestination(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn list_error(context: &str, err: ListError) -> CliError {
    match err {
        ListError::Acnet(err) => acnet_error(context, err),
        ListError::UnexpectedReply { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ListError::NoEntry(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}
