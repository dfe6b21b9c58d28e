use coprocwire_frame::{FrameError, ProtocolError, ReadError};
use coprocwire_transport::TransportError;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error outside a read (connect, drain).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be encoded or written.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No complete response was collected.
    #[error("read error: {0}")]
    Read(#[from] ReadError),

    /// A response arrived but does not answer this call, or reports failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A function name that would not survive operand packing.
    #[error("invalid function name {0:?}")]
    InvalidFunctionName(String),

    /// Client configuration was rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Whether re-issuing the same call may succeed.
    ///
    /// Only a read timeout qualifies. Protocol errors are never retried: the
    /// remote side may already have executed the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Read(err) if err.is_timeout())
    }

    /// The failure token, if the remote side reported one.
    pub fn remote_failure(&self) -> Option<&str> {
        match self {
            ClientError::Protocol(ProtocolError::RemoteFailure(reason)) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
