//! Remote calls to a companion coprocessor over unframed byte links.
//!
//! coprocwire issues named calls (run a program, call a function, evaluate an
//! expression) across a slow, unframed channel such as a serial line, and
//! recovers validated responses despite partial reads and timing noise.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-channel and clock traits, Unix socket/TCP/serial links
//! - [`frame`]: Terminator-delimited framing, bounded frame reader, response checks
//! - [`client`]: Blocking client, payload codecs, companion-side responder (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use coprocwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use coprocwire_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use coprocwire_client::*;
}
