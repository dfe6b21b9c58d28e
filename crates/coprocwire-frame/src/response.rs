//! Response decoding and provenance checks.
//!
//! Everything here is a pure function of the frame bytes and the expectation
//! computed from the originating [`CallEnvelope`]. Transport and timing
//! concerns stay in [`crate::reader`].

use crate::codec::{CallEnvelope, Operation, FIELD_SEPARATOR, SUCCESS, TERMINATOR};
use crate::error::ProtocolError;

/// The five fields of an inbound response, borrowed from the raw frame.
///
/// `payload` has the terminator already stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    pub application_id: &'a str,
    pub call_id: &'a str,
    pub operation: &'a str,
    pub status: &'a str,
    pub payload: &'a str,
}

impl<'a> ResponseFrame<'a> {
    /// Check every echoed field against the call that was made, in wire order.
    ///
    /// Returns the payload on success.
    pub fn validate(
        &self,
        expected_app_id: &str,
        expected_call_id: u64,
        expected_operation: Operation,
    ) -> Result<&'a str, ProtocolError> {
        if self.application_id != expected_app_id {
            return Err(ProtocolError::IdentityMismatch {
                expected: expected_app_id.to_string(),
                found: self.application_id.to_string(),
            });
        }
        if self.call_id != expected_call_id.to_string() {
            return Err(ProtocolError::SequenceMismatch {
                expected: expected_call_id,
                found: self.call_id.to_string(),
            });
        }
        if self.operation != expected_operation.as_str() {
            return Err(ProtocolError::OperationMismatch {
                expected: expected_operation.as_str().to_string(),
                found: self.operation.to_string(),
            });
        }
        if self.status != SUCCESS {
            return Err(ProtocolError::RemoteFailure(self.status.to_string()));
        }
        Ok(self.payload)
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS
    }
}

/// Split a raw response frame (terminator included) into its five fields.
///
/// At most five tokens are produced: a payload that itself contains the
/// separator stays in one piece. Fewer than five tokens, or a last token that
/// does not end in the terminator, is [`ProtocolError::Truncated`].
pub fn parse_response(raw: &[u8]) -> Result<ResponseFrame<'_>, ProtocolError> {
    let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::NotText)?;

    let mut tokens = text.splitn(5, FIELD_SEPARATOR);
    let application_id = tokens.next().ok_or(ProtocolError::Truncated)?;
    let call_id = tokens.next().ok_or(ProtocolError::Truncated)?;
    let operation = tokens.next().ok_or(ProtocolError::Truncated)?;
    let status = tokens.next().ok_or(ProtocolError::Truncated)?;
    let tail = tokens.next().ok_or(ProtocolError::Truncated)?;

    // The terminator sits exactly at the tail; strip it by length.
    if !tail.ends_with(TERMINATOR) {
        return Err(ProtocolError::Truncated);
    }
    let payload = &tail[..tail.len() - TERMINATOR.len()];

    Ok(ResponseFrame {
        application_id,
        call_id,
        operation,
        status,
        payload,
    })
}

/// Decode a response and check that it answers the expected call.
pub fn decode_response(
    raw: &[u8],
    expected_app_id: &str,
    expected_call_id: u64,
    expected_operation: Operation,
) -> Result<String, ProtocolError> {
    let frame = parse_response(raw)?;
    let payload = frame.validate(expected_app_id, expected_call_id, expected_operation)?;
    Ok(payload.to_string())
}

/// Parse a raw request frame (companion side).
pub fn parse_call(raw: &[u8]) -> Result<CallEnvelope, ProtocolError> {
    let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::NotText)?;

    let mut tokens = text.splitn(4, FIELD_SEPARATOR);
    let application_id = tokens.next().ok_or(ProtocolError::Truncated)?;
    let call_id = tokens.next().ok_or(ProtocolError::Truncated)?;
    let operation = tokens.next().ok_or(ProtocolError::Truncated)?;
    let tail = tokens.next().ok_or(ProtocolError::Truncated)?;

    if !tail.ends_with(TERMINATOR) {
        return Err(ProtocolError::Truncated);
    }
    let operand = &tail[..tail.len() - TERMINATOR.len()];

    let call_id = call_id
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidCallId(call_id.to_string()))?;
    let operation = operation.parse::<Operation>()?;

    Ok(CallEnvelope::new(application_id, call_id, operation, operand))
}
