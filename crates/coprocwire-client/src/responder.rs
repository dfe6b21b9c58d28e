//! Companion side of the protocol.
//!
//! A [`Responder`] reads one call at a time, hands it to a handler, and
//! writes the answer back. It exists so the client can be exercised against
//! a real peer (tests, `coprocwire echo`) without the actual companion.

use coprocwire_frame::{
    check_payload, check_reserved, parse_call, CallEnvelope, FieldPosition, FrameReader,
    FrameWriter, ProtocolError, ReadError, ReaderConfig, SUCCESS, TIMEOUT_MARKER,
};
use coprocwire_transport::{Clock, SystemClock, Transport};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Status token sent when the handler's own reason cannot be framed.
const GENERIC_FAILURE: &str = "FAILURE";

/// What one [`Responder::serve_one`] pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A call was answered.
    Served(CallEnvelope),
    /// A frame arrived but was not a valid call. Nothing was sent back.
    Rejected(ProtocolError),
    /// No complete frame within the read budget.
    Idle,
    /// The client hung up.
    Closed,
}

#[derive(Debug)]
pub struct Responder<T, C = SystemClock> {
    transport: T,
    clock: C,
    reader: FrameReader,
    writer: FrameWriter,
    served: u64,
}

impl<T: Transport> Responder<T, SystemClock> {
    pub fn new(transport: T, config: ReaderConfig) -> Self {
        Self::with_clock(transport, SystemClock::new(), config)
    }
}

impl<T: Transport, C: Clock> Responder<T, C> {
    pub fn with_clock(transport: T, clock: C, config: ReaderConfig) -> Self {
        let writer = FrameWriter::with_max_frame_size(config.max_frame_size);
        Self {
            transport,
            clock,
            reader: FrameReader::with_config(config),
            writer,
            served: 0,
        }
    }

    /// Wait for one call and answer it.
    ///
    /// `handler` returns the success payload, or a failure token that is sent
    /// back as the status.
    pub fn serve_one<F>(&mut self, handler: F) -> Result<ServeOutcome>
    where
        F: FnOnce(&CallEnvelope) -> std::result::Result<String, String>,
    {
        let raw = match self.reader.read_frame(&mut self.transport, &self.clock) {
            Ok(raw) => raw,
            Err(ReadError::Timeout { partial, .. }) => {
                if self.transport.is_closed()? {
                    info!(served = self.served, "client disconnected");
                    return Ok(ServeOutcome::Closed);
                }
                if partial.len() > TIMEOUT_MARKER.len() {
                    warn!(
                        bytes = partial.len() - TIMEOUT_MARKER.len(),
                        "discarded incomplete request"
                    );
                }
                return Ok(ServeOutcome::Idle);
            }
            Err(err) => return Err(err.into()),
        };

        let call = match parse_call(&raw) {
            Ok(call) => call,
            Err(err) => {
                warn!(error = %err, "rejected request frame");
                return Ok(ServeOutcome::Rejected(err));
            }
        };

        let (status, payload) = match handler(&call) {
            Ok(payload) if check_payload(&payload).is_err() => {
                warn!(call_id = call.call_id, "handler payload cannot be framed");
                (GENERIC_FAILURE.to_string(), String::new())
            }
            Ok(payload) => (SUCCESS.to_string(), payload),
            Err(reason)
                if reason.is_empty()
                    || check_reserved("status", &reason, FieldPosition::Inner).is_err() =>
            {
                (GENERIC_FAILURE.to_string(), String::new())
            }
            Err(reason) => (reason, String::new()),
        };

        self.writer.send_response(
            &mut self.transport,
            &call.application_id,
            call.call_id,
            call.operation,
            &status,
            &payload,
        )?;
        self.served += 1;
        debug!(
            call_id = call.call_id,
            operation = %call.operation,
            status = %status,
            "answered call"
        );
        Ok(ServeOutcome::Served(call))
    }

    /// Serve calls until the client hangs up or `stop` returns true.
    ///
    /// `stop` is checked between reads, so shutdown latency is bounded by
    /// the reader's worst-case wait. Returns the number of calls answered.
    pub fn serve<F, S>(&mut self, mut handler: F, mut stop: S) -> Result<u64>
    where
        F: FnMut(&CallEnvelope) -> std::result::Result<String, String>,
        S: FnMut() -> bool,
    {
        let start = self.served;
        while !stop() {
            if self.serve_one(&mut handler)? == ServeOutcome::Closed {
                break;
            }
        }
        Ok(self.served - start)
    }

    /// Calls answered so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
