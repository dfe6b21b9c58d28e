use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, ProtocolError, Result};

/// Separator between fields of a frame.
pub const FIELD_SEPARATOR: &str = ";;;";

/// End-of-message marker appended after the last field.
pub const TERMINATOR: &str = ";;@@&&";

/// Status token of a successful response.
pub const SUCCESS: &str = "SUCCESS";

/// Separator between function name and arguments inside a FUNCTION operand.
pub const FUNCTION_SEPARATOR: &str = "&&&";

/// Appended to the partial bytes handed back on a read timeout.
pub const TIMEOUT_MARKER: &[u8] = b"TIMEOUT";

/// Headroom reserved on top of the variable-length fields when encoding.
pub const FRAME_OVERHEAD_MARGIN: usize = 1024;

/// Default maximum encoded or received frame size: 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// The remote action a call requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Load and run a program.
    Program,
    /// Invoke a named function.
    Function,
    /// Evaluate an expression.
    Eval,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Program, Operation::Function, Operation::Eval];

    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Program => "PROGRAM",
            Operation::Function => "FUNCTION",
            Operation::Eval => "EVAL",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownOperation(s.to_string()))
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEnvelope {
    /// Identifies this client instance to the remote side.
    pub application_id: String,
    /// Per-process sequence number, echoed back in the response.
    pub call_id: u64,
    pub operation: Operation,
    /// Opaque payload. Must not contain the separator or terminator.
    pub operand: String,
}

impl CallEnvelope {
    pub fn new(
        application_id: impl Into<String>,
        call_id: u64,
        operation: Operation,
        operand: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            call_id,
            operation,
            operand: operand.into(),
        }
    }

    /// Exact size of this envelope on the wire.
    pub fn encoded_len(&self) -> usize {
        self.application_id.len()
            + decimal_len(self.call_id)
            + self.operation.as_str().len()
            + self.operand.len()
            + 3 * FIELD_SEPARATOR.len()
            + TERMINATOR.len()
    }
}

/// Where a field sits in a frame, which decides the delimiters it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPosition {
    /// First field of a frame, followed by a separator.
    First,
    /// Header field with a separator on both sides.
    Inner,
    /// Last field, after a separator and before the terminator.
    Last,
}

/// Reject values that would corrupt framing if sent verbatim.
///
/// Besides the reserved sequences themselves, a value must not complete one
/// together with its neighbour: `a;` before a separator splits one byte
/// early, and `@@&&` after a separator reads as a terminator.
pub fn check_reserved(field: &'static str, value: &str, position: FieldPosition) -> Result<()> {
    for sequence in [FIELD_SEPARATOR, TERMINATOR] {
        if value.contains(sequence) {
            return Err(FrameError::ReservedSequence { field, sequence });
        }
    }
    check_boundaries(field, value, position)
}

fn check_boundaries(field: &'static str, value: &str, position: FieldPosition) -> Result<()> {
    if position != FieldPosition::First && opens_terminator(value) {
        return Err(FrameError::FormsReservedSequence {
            field,
            sequence: TERMINATOR,
        });
    }
    if position != FieldPosition::Last && closes_separator_early(value) {
        return Err(FrameError::FormsReservedSequence {
            field,
            sequence: FIELD_SEPARATOR,
        });
    }
    Ok(())
}

/// Whether the separator before `value` plus its first bytes spell a terminator.
fn opens_terminator(value: &str) -> bool {
    (1..TERMINATOR.len()).any(|split| {
        let (head, tail) = TERMINATOR.split_at(split);
        FIELD_SEPARATOR.ends_with(head) && value.starts_with(tail)
    })
}

/// Whether the tail of `value` plus the separator after it contain a separator
/// that starts inside `value`.
fn closes_separator_early(value: &str) -> bool {
    (1..FIELD_SEPARATOR.len()).any(|split| {
        let (head, rest) = FIELD_SEPARATOR.split_at(split);
        value.ends_with(head) && FIELD_SEPARATOR.starts_with(rest)
    })
}

/// Encode a request into the wire format.
///
/// ```text
/// <application_id>;;;<call_id>;;;<operation>;;;<operand>;;@@&&
/// ```
///
/// No escaping is performed: an application id or operand that would break
/// the framing is rejected instead.
pub fn encode_call(envelope: &CallEnvelope, dst: &mut BytesMut, max_frame_size: usize) -> Result<()> {
    check_reserved("application id", &envelope.application_id, FieldPosition::First)?;
    check_reserved("operand", &envelope.operand, FieldPosition::Last)?;

    let size = envelope.encoded_len();
    if size > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size,
            max: max_frame_size,
        });
    }

    dst.reserve(envelope.application_id.len() + envelope.operand.len() + FRAME_OVERHEAD_MARGIN);
    put_field(dst, envelope.application_id.as_bytes());
    put_field(dst, envelope.call_id.to_string().as_bytes());
    put_field(dst, envelope.operation.as_str().as_bytes());
    dst.put_slice(envelope.operand.as_bytes());
    dst.put_slice(TERMINATOR.as_bytes());
    Ok(())
}

/// Encode a response (companion side).
///
/// ```text
/// <application_id>;;;<call_id>;;;<operation>;;;<status>;;;<payload>;;@@&&
/// ```
///
/// The payload may carry the separator (the decoder keeps everything after the
/// fourth separator together) but never the terminator.
pub fn encode_response(
    application_id: &str,
    call_id: u64,
    operation: Operation,
    status: &str,
    payload: &str,
    dst: &mut BytesMut,
) -> Result<()> {
    check_reserved("application id", application_id, FieldPosition::First)?;
    check_reserved("status", status, FieldPosition::Inner)?;
    check_payload(payload)?;

    dst.reserve(application_id.len() + status.len() + payload.len() + FRAME_OVERHEAD_MARGIN);
    put_field(dst, application_id.as_bytes());
    put_field(dst, call_id.to_string().as_bytes());
    put_field(dst, operation.as_str().as_bytes());
    put_field(dst, status.as_bytes());
    dst.put_slice(payload.as_bytes());
    dst.put_slice(TERMINATOR.as_bytes());
    Ok(())
}

/// Response payloads may carry the separator, so only the terminator is
/// off limits.
pub fn check_payload(payload: &str) -> Result<()> {
    if payload.contains(TERMINATOR) {
        return Err(FrameError::ReservedSequence {
            field: "payload",
            sequence: TERMINATOR,
        });
    }
    check_boundaries("payload", payload, FieldPosition::Last)
}

fn put_field(dst: &mut BytesMut, field: &[u8]) {
    dst.put_slice(field);
    dst.put_slice(FIELD_SEPARATOR.as_bytes());
}

fn decimal_len(mut value: u64) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
