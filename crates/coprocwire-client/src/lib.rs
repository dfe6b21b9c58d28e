//! Blocking remote-call client for a companion coprocessor process.
//!
//! This is the layer a UI talks to. A [`CoprocessorClient`] owns the link,
//! the application id, and the call-id counter, and turns each of
//! [`run_program`](CoprocessorClient::run_program),
//! [`call_function`](CoprocessorClient::call_function) and
//! [`evaluate`](CoprocessorClient::evaluate) into one request/response round
//! trip. The [`payload`] module decodes the structured payloads the chat UI
//! needs. [`Responder`] speaks the companion half of the protocol.

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod payload;
pub mod responder;

pub use client::CoprocessorClient;
pub use config::{ClientConfig, DEFAULT_APPLICATION_ID};
#[cfg(unix)]
pub use connector::{connect, connect_tcp, connect_unix, open_serial, DynClient};
pub use connector::Endpoint;
pub use error::{ClientError, Result};
pub use payload::{
    apply_unread_updates, decode_count_map, decode_list, label_matches, merge_label,
    pack_function_call, strip_unread_prefix, unpack_function_call, unread_label, CountMapDecode,
    PayloadCodecError, UnreadCount,
};
pub use responder::{Responder, ServeOutcome};
