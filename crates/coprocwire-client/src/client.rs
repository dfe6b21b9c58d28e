use coprocwire_frame::{
    check_reserved, decode_response, CallEnvelope, FieldPosition, FrameReader, FrameWriter,
    Operation, FUNCTION_SEPARATOR,
};
use coprocwire_transport::{Clock, SystemClock, Transport};
use tracing::{debug, debug_span, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::payload::pack_function_call;

/// A blocking remote-call session with one companion process.
///
/// The client owns the transport, the application id, and the call-id
/// counter. Calls take `&mut self`, so at most one is ever in flight; the
/// counter relies on that. Ids start at 0 and every call that reaches the
/// wire consumes one, whether or not it succeeds.
#[derive(Debug)]
pub struct CoprocessorClient<T, C = SystemClock> {
    transport: T,
    clock: C,
    config: ClientConfig,
    next_call_id: u64,
    reader: FrameReader,
    writer: FrameWriter,
}

impl<T: Transport> CoprocessorClient<T, SystemClock> {
    /// Wrap an open transport using the wall clock.
    pub fn new(transport: T, config: ClientConfig) -> Result<Self> {
        Self::with_clock(transport, SystemClock::new(), config)
    }
}

impl<T: Transport, C: Clock> CoprocessorClient<T, C> {
    /// Wrap an open transport with an explicit clock.
    pub fn with_clock(transport: T, clock: C, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            application_id = %config.application_id,
            timeout_iterations = config.reader.timeout_iterations,
            "coprocessor client ready"
        );
        Ok(Self {
            transport,
            clock,
            reader: FrameReader::with_config(config.reader.clone()),
            writer: FrameWriter::with_max_frame_size(config.max_frame_size),
            config,
            next_call_id: 0,
        })
    }

    /// Load and run a program on the companion side.
    pub fn run_program(&mut self, source: &str) -> Result<String> {
        self.call(Operation::Program, source)
    }

    /// Invoke a named function. `arguments` is passed through opaquely.
    pub fn call_function(&mut self, name: &str, arguments: &str) -> Result<String> {
        if name.is_empty() || name.contains(FUNCTION_SEPARATOR) {
            return Err(ClientError::InvalidFunctionName(name.to_string()));
        }
        let operand = pack_function_call(name, arguments);
        self.call(Operation::Function, &operand)
    }

    /// Evaluate an expression on the companion side.
    pub fn evaluate(&mut self, expression: &str) -> Result<String> {
        self.call(Operation::Eval, expression)
    }

    /// One request/response round trip.
    ///
    /// An operand that would break the framing is rejected before an id is
    /// assigned.
    pub fn call(&mut self, operation: Operation, operand: &str) -> Result<String> {
        check_reserved("operand", operand, FieldPosition::Last)?;

        let call_id = self.next_call_id;
        self.next_call_id += 1;

        let span = debug_span!("call", call_id, operation = %operation);
        let _enter = span.enter();

        if self.config.drain_before_call {
            let stale = self.transport.discard_pending()?;
            if stale > 0 {
                warn!(stale, "discarded stale input before call");
            }
        }

        let envelope = CallEnvelope::new(
            self.config.application_id.as_str(),
            call_id,
            operation,
            operand,
        );
        let written = self.writer.send_call(&mut self.transport, &envelope)?;
        debug!(bytes = written, "request written");

        let raw = self.reader.read_frame(&mut self.transport, &self.clock)?;
        match decode_response(&raw, &self.config.application_id, call_id, operation) {
            Ok(payload) => {
                debug!(bytes = payload.len(), "call succeeded");
                Ok(payload)
            }
            Err(err) => {
                warn!(error = %err, "response rejected");
                Err(err.into())
            }
        }
    }

    /// The id the next call will use.
    pub fn next_call_id(&self) -> u64 {
        self.next_call_id
    }

    pub fn application_id(&self) -> &str {
        &self.config.application_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}
