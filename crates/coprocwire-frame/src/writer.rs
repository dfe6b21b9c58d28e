use bytes::BytesMut;
use coprocwire_transport::Transport;
use tracing::trace;

use crate::codec::{encode_call, encode_response, CallEnvelope, Operation, DEFAULT_MAX_FRAME_SIZE};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Encodes frames into a reusable buffer and writes them to a [`Transport`].
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWriter {
    /// Create a frame writer with the default size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame writer with an explicit size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_size,
        }
    }

    /// Encode and write one request. Returns the number of bytes written.
    pub fn send_call<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        envelope: &CallEnvelope,
    ) -> Result<usize> {
        self.buf.clear();
        encode_call(envelope, &mut self.buf, self.max_frame_size)?;
        trace!(
            call_id = envelope.call_id,
            operation = %envelope.operation,
            bytes = self.buf.len(),
            "writing call frame"
        );
        transport.write(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Encode and write one response (companion side).
    pub fn send_response<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        application_id: &str,
        call_id: u64,
        operation: Operation,
        status: &str,
        payload: &str,
    ) -> Result<usize> {
        self.buf.clear();
        encode_response(application_id, call_id, operation, status, payload, &mut self.buf)?;
        transport.write(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Update the maximum encoded frame size.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

#[cfg(test)]
mod tests {
    use coprocwire_transport::TransportError;

    use super::*;
    use crate::codec::SUCCESS;
    use crate::error::FrameError;
    use crate::response::{decode_response, parse_call};

    #[derive(Default)]
    struct Sink {
        written: Vec<u8>,
        writes: usize,
        closed: bool,
    }

    impl Transport for Sink {
        fn write(&mut self, bytes: &[u8]) -> coprocwire_transport::Result<()> {
            if self.closed {
                return Err(TransportError::Closed);
            }
            self.writes += 1;
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn bytes_available(&mut self) -> coprocwire_transport::Result<usize> {
            Ok(0)
        }

        fn read(&mut self, _buf: &mut [u8]) -> coprocwire_transport::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn writes_one_frame_per_call() {
        let mut sink = Sink::default();
        let mut writer = FrameWriter::new();

        let n = writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Eval, "1+1"))
            .unwrap();

        assert_eq!(sink.writes, 1);
        assert_eq!(n, sink.written.len());
        assert_eq!(parse_call(&sink.written).unwrap().operand, "1+1");
    }

    #[test]
    fn buffer_is_reused_between_calls() {
        let mut sink = Sink::default();
        let mut writer = FrameWriter::new();

        writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Eval, "first"))
            .unwrap();
        let first_len = sink.written.len();
        writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 1, Operation::Eval, "second"))
            .unwrap();

        let second = parse_call(&sink.written[first_len..]).unwrap();
        assert_eq!(second.call_id, 1);
        assert_eq!(second.operand, "second");
    }

    #[test]
    fn rejected_operand_writes_nothing() {
        let mut sink = Sink::default();
        let mut writer = FrameWriter::new();

        let err = writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Eval, "a;;;b"))
            .unwrap_err();

        assert!(matches!(err, FrameError::ReservedSequence { .. }));
        assert_eq!(sink.writes, 0);
    }

    #[test]
    fn size_limit_applies() {
        let mut sink = Sink::default();
        let mut writer = FrameWriter::with_max_frame_size(16);

        let err = writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Program, "x".repeat(32)))
            .unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));

        writer.set_max_frame_size(1024);
        assert_eq!(writer.max_frame_size(), 1024);
        assert!(writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Program, "x".repeat(32)))
            .is_ok());
    }

    #[test]
    fn transport_error_is_wrapped() {
        let mut sink = Sink {
            closed: true,
            ..Sink::default()
        };
        let mut writer = FrameWriter::new();

        let err = writer
            .send_call(&mut sink, &CallEnvelope::new("chat", 0, Operation::Eval, "1"))
            .unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Closed)));
    }

    #[test]
    fn response_frames_decode() {
        let mut sink = Sink::default();
        let mut writer = FrameWriter::new();

        writer
            .send_response(&mut sink, "chat", 5, Operation::Function, SUCCESS, "Alice:::1")
            .unwrap();

        let payload = decode_response(&sink.written, "chat", 5, Operation::Function).unwrap();
        assert_eq!(payload, "Alice:::1");
    }
}
