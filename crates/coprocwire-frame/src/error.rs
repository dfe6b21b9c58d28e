use bytes::Bytes;
use coprocwire_transport::TransportError;

/// Errors raised while building or sending a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A field contains the separator or terminator and would break framing.
    #[error("{field} contains reserved sequence {sequence:?}")]
    ReservedSequence {
        field: &'static str,
        sequence: &'static str,
    },

    /// A field is clean on its own but would join the delimiter next to it
    /// into a reserved sequence once framed.
    #[error("{field} would form {sequence:?} with the adjacent delimiter")]
    FormsReservedSequence {
        field: &'static str,
        sequence: &'static str,
    },

    /// The encoded frame exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The transport rejected the write.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised while collecting a frame from the transport.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// No terminator was seen within the iteration budget.
    ///
    /// `partial` holds whatever was gathered, followed by
    /// [`TIMEOUT_MARKER`](crate::codec::TIMEOUT_MARKER). `drained` counts the
    /// stale bytes discarded from the transport afterwards.
    #[error("no terminator after {iterations} poll iterations ({} bytes gathered)", .partial.len())]
    Timeout {
        iterations: u32,
        partial: Bytes,
        drained: usize,
    },

    /// More bytes arrived than a single frame may hold.
    #[error("incoming frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The transport failed while polling or reading.
    #[error("read transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ReadError {
    /// Whether this is a terminator timeout (the only retryable read failure).
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadError::Timeout { .. })
    }
}

/// The frame does not answer the call that was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("application id mismatch (expected {expected:?}, got {found:?})")]
    IdentityMismatch { expected: String, found: String },

    #[error("call id mismatch (expected {expected}, got {found:?})")]
    SequenceMismatch { expected: u64, found: String },

    #[error("operation mismatch (expected {expected}, got {found:?})")]
    OperationMismatch { expected: String, found: String },

    /// The remote side reported failure. The status token is kept verbatim.
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// Fewer fields than the frame shape requires, or no terminator tail.
    #[error("truncated frame")]
    Truncated,

    /// The frame is not valid UTF-8 text.
    #[error("frame is not valid text")]
    NotText,

    /// Request carried an operation tag outside PROGRAM/FUNCTION/EVAL.
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    /// Request carried a call id that is not a decimal integer.
    #[error("invalid call id {0:?}")]
    InvalidCallId(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
