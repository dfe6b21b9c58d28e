use std::fmt;
use std::io;

use coprocwire_client::ClientError;
use coprocwire_frame::{FrameError, ProtocolError, ReadError};
use coprocwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const REMOTE_FAILURE: i32 = 40;
pub const PROTOCOL_ERROR: i32 = 60;
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
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { ref source, .. } if source.kind() == io::ErrorKind::TimedOut => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(FrameError::Transport(err)) => transport_error(context, err),
        ClientError::Frame(err) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Read(ReadError::Transport(err)) => transport_error(context, err),
        ClientError::Read(err @ ReadError::Timeout { .. }) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        ClientError::Read(err) => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        ClientError::Protocol(ProtocolError::RemoteFailure(reason)) => CliError::new(
            REMOTE_FAILURE,
            format!("{context}: remote side reported {reason}"),
        ),
        ClientError::Protocol(err) => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        err @ (ClientError::InvalidFunctionName(_) | ClientError::InvalidConfig(_)) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_maps_to_dedicated_code() {
        let err = client_error(
            "call failed",
            ClientError::Protocol(ProtocolError::RemoteFailure("BUSY".to_string())),
        );
        assert_eq!(err.code, REMOTE_FAILURE);
        assert!(err.message.contains("BUSY"));
    }

    #[test]
    fn mismatches_map_to_protocol_error() {
        let err = client_error(
            "call failed",
            ClientError::Protocol(ProtocolError::SequenceMismatch {
                expected: 2,
                found: "1".to_string(),
            }),
        );
        assert_eq!(err.code, PROTOCOL_ERROR);
    }

    #[test]
    fn reserved_operand_is_usage_error() {
        let err = client_error(
            "call failed",
            ClientError::Frame(FrameError::ReservedSequence {
                field: "operand",
                sequence: ";;;",
            }),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_socket_is_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                target: "/tmp/none.sock".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
