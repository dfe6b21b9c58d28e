//! Terminator-delimited call/response framing for coprocessor calls.
//!
//! Every message is a run of text fields joined by a three-byte separator and
//! closed by a six-byte terminator:
//!
//! ```text
//! request:  <app_id>;;;<call_id>;;;<operation>;;;<operand>;;@@&&
//! response: <app_id>;;;<call_id>;;;<operation>;;;<status>;;;<payload>;;@@&&
//! ```
//!
//! There is no length prefix, so the terminator is the only end-of-message
//! signal. [`FrameReader`] polls a [`coprocwire_transport::Transport`] until it
//! sees one; [`decode_response`] checks that the frame answers the call that
//! was made.

pub mod codec;
pub mod error;
pub mod reader;
pub mod response;
pub mod writer;

pub use codec::{
    check_payload, check_reserved, encode_call, encode_response, CallEnvelope, FieldPosition,
    Operation, DEFAULT_MAX_FRAME_SIZE, FIELD_SEPARATOR, FRAME_OVERHEAD_MARGIN, FUNCTION_SEPARATOR,
    SUCCESS, TERMINATOR, TIMEOUT_MARKER,
};
pub use error::{FrameError, ProtocolError, ReadError, Result};
pub use reader::{FrameReader, ReaderConfig, ReceiveBuffer};
pub use response::{decode_response, parse_call, parse_response, ResponseFrame};
pub use writer::FrameWriter;
