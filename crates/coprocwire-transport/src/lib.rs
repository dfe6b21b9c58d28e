//! Byte-stream transport abstraction for coprocessor calls.
//!
//! The protocol layers above only need three primitives from a channel:
//! write bytes, poll how many bytes are waiting, and read bytes that are
//! already waiting. Plus a clock to pace the polling. This crate provides:
//! - [`Transport`] and [`Clock`] traits
//! - [`StreamTransport`] over Unix sockets, TCP, and serial TTYs (Unix)
//! - [`SocketListener`] for the companion side of a Unix socket link
//!
//! This is the lowest layer of coprocwire. Everything else builds on top of
//! these traits and never assumes a particular physical link.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{Clock, SystemClock, Transport};

#[cfg(unix)]
pub use serial::{Parity, SerialConfig, StopBits};
#[cfg(unix)]
pub use stream::StreamTransport;
#[cfg(unix)]
pub use uds::SocketListener;
