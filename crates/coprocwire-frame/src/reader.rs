use std::time::Duration;

use bytes::{Bytes, BytesMut};
use coprocwire_transport::{Clock, Transport};
use tracing::{debug, trace, warn};

use crate::codec::{DEFAULT_MAX_FRAME_SIZE, TERMINATOR, TIMEOUT_MARKER};
use crate::error::ReadError;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Pacing and bounds for [`FrameReader::read_frame`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Pause before the first poll so the remote side can start answering.
    pub initial_wait: Duration,
    /// Pause between the two byte-count polls of one iteration.
    pub poll_interval: Duration,
    /// Hard cap on poll iterations before giving up.
    pub timeout_iterations: u32,
    /// Largest frame accepted, terminator included.
    pub max_frame_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            timeout_iterations: 1000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ReaderConfig {
    /// Upper bound on how long one read may block.
    pub fn worst_case_wait(&self) -> Duration {
        self.initial_wait + self.poll_interval * self.timeout_iterations
    }
}

/// Bytes gathered for the call currently being read.
///
/// Lives for exactly one read phase: [`FrameReader`] clears it when the read
/// ends, whatever the outcome.
#[derive(Debug)]
pub struct ReceiveBuffer {
    bytes: BytesMut,
    terminator_seen: bool,
    scanned: usize,
}

impl ReceiveBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            terminator_seen: false,
            scanned: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn terminator_seen(&self) -> bool {
        self.terminator_seen
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Look for the terminator in bytes not yet scanned.
    ///
    /// Returns the end offset of the frame (just past the terminator). A
    /// terminator split across two appends is still found because the scan
    /// restarts `TERMINATOR.len() - 1` bytes before the previous end.
    fn scan(&mut self) -> Option<usize> {
        let needle = TERMINATOR.as_bytes();
        let start = self.scanned.saturating_sub(needle.len() - 1);
        let found = self.bytes[start..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| start + pos + needle.len());

        self.scanned = self.bytes.len();
        if found.is_some() {
            self.terminator_seen = true;
        }
        found
    }

    fn take_frame(&mut self, end: usize) -> Bytes {
        self.bytes.split_to(end).freeze()
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.terminator_seen = false;
        self.scanned = 0;
    }
}

/// Collects one terminator-delimited frame from a polled [`Transport`].
///
/// The transport has no framing and no flow control, so the reader waits for
/// the pending byte count to stop changing between two polls before reading
/// ("settling"). Settling only paces the reads: a frame is complete when, and
/// only when, the terminator has been seen.
#[derive(Debug)]
pub struct FrameReader {
    buffer: ReceiveBuffer,
    config: ReaderConfig,
    chunk: Vec<u8>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a frame reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            buffer: ReceiveBuffer::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            chunk: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    /// Read the next complete frame (blocking, bounded).
    ///
    /// On success the frame ends with the terminator; any bytes that followed
    /// it in the same burst are discarded. On timeout the pending input on the
    /// transport is drained so it cannot leak into the next call.
    pub fn read_frame<T, C>(&mut self, transport: &mut T, clock: &C) -> Result<Bytes, ReadError>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        self.buffer.clear();
        let result = self.collect(transport, clock);
        self.buffer.clear();
        result
    }

    fn collect<T, C>(&mut self, transport: &mut T, clock: &C) -> Result<Bytes, ReadError>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        let started = clock.now_ticks();
        clock.wait(self.config.initial_wait);

        for iteration in 0..self.config.timeout_iterations {
            let first = transport.bytes_available()?;
            clock.wait(self.config.poll_interval);
            if first == 0 {
                continue;
            }

            let second = transport.bytes_available()?;
            if second != first {
                trace!(iteration, first, second, "input still arriving");
                continue;
            }

            self.pull(transport, second)?;

            // Only the frame itself counts against the limit, not trailing noise.
            let found = self.buffer.scan();
            let size = found.unwrap_or(self.buffer.len());
            if size > self.config.max_frame_size {
                let drained = transport.discard_pending()?;
                warn!(
                    size,
                    max = self.config.max_frame_size,
                    drained,
                    "incoming frame exceeds limit; discarding"
                );
                return Err(ReadError::FrameTooLarge {
                    size,
                    max: self.config.max_frame_size,
                });
            }

            if let Some(end) = found {
                let frame = self.buffer.take_frame(end);
                if !self.buffer.is_empty() {
                    debug!(
                        trailing = self.buffer.len(),
                        "discarding bytes after terminator"
                    );
                }
                debug!(
                    bytes = frame.len(),
                    iterations = iteration + 1,
                    elapsed_ticks = clock.now_ticks().saturating_sub(started),
                    "frame complete"
                );
                return Ok(frame);
            }

            trace!(
                iteration,
                buffered = self.buffer.len(),
                "settled without terminator"
            );
        }

        let mut partial = BytesMut::with_capacity(self.buffer.len() + TIMEOUT_MARKER.len());
        partial.extend_from_slice(self.buffer.as_bytes());
        partial.extend_from_slice(TIMEOUT_MARKER);

        let drained = match transport.discard_pending() {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "failed draining transport after timeout");
                0
            }
        };

        warn!(
            iterations = self.config.timeout_iterations,
            gathered = self.buffer.len(),
            drained,
            "timed out waiting for terminator"
        );

        Err(ReadError::Timeout {
            iterations: self.config.timeout_iterations,
            partial: partial.freeze(),
            drained,
        })
    }

    /// Read exactly `count` pending bytes into the receive buffer.
    fn pull<T: Transport + ?Sized>(&mut self, transport: &mut T, count: usize) -> Result<(), ReadError> {
        let mut remaining = count;
        while remaining > 0 {
            let want = remaining.min(self.chunk.len());
            let read = transport.read(&mut self.chunk[..want])?;
            if read == 0 {
                break;
            }
            self.buffer.extend(&self.chunk[..read]);
            remaining -= read;
        }
        Ok(())
    }

    /// The receive buffer. Always empty between reads.
    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }

    /// Current reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Replace the iteration budget for subsequent reads.
    pub fn set_timeout_iterations(&mut self, iterations: u32) {
        self.config.timeout_iterations = iterations;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use coprocwire_transport::{StreamTransport, SystemClock, TransportError};

    use super::*;

    /// Clock that advances only when waited on. One tick per millisecond.
    #[derive(Default)]
    struct ManualClock {
        ticks: Cell<u64>,
        waits: Cell<u32>,
    }

    impl Clock for ManualClock {
        fn now_ticks(&self) -> u64 {
            self.ticks.get()
        }

        fn wait(&self, duration: Duration) {
            self.ticks.set(self.ticks.get() + duration.as_millis() as u64);
            self.waits.set(self.waits.get() + 1);
        }
    }

    /// Releases scripted bursts onto the line once the clock reaches their tick.
    struct ScriptedTransport {
        clock: Rc<ManualClock>,
        schedule: VecDeque<(u64, Vec<u8>)>,
        line: VecDeque<u8>,
        trickle: bool,
        last_trickle: Option<u64>,
        fail_reads: bool,
    }

    impl ScriptedTransport {
        fn new(clock: Rc<ManualClock>, schedule: Vec<(u64, &[u8])>) -> Self {
            Self {
                clock,
                schedule: schedule.into_iter().map(|(t, b)| (t, b.to_vec())).collect(),
                line: VecDeque::new(),
                trickle: false,
                last_trickle: None,
                fail_reads: false,
            }
        }

        fn release(&mut self) {
            let now = self.clock.now_ticks();
            while self.schedule.front().is_some_and(|(at, _)| *at <= now) {
                if let Some((_, burst)) = self.schedule.pop_front() {
                    self.line.extend(burst);
                }
            }
            // One noise byte per clock step, so the count never settles.
            if self.trickle && self.last_trickle != Some(now) {
                self.line.push_back(b'~');
                self.last_trickle = Some(now);
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn write(&mut self, _bytes: &[u8]) -> coprocwire_transport::Result<()> {
            Ok(())
        }

        fn bytes_available(&mut self) -> coprocwire_transport::Result<usize> {
            self.release();
            Ok(self.line.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> coprocwire_transport::Result<usize> {
            if self.fail_reads {
                return Err(TransportError::Closed);
            }
            let n = buf.len().min(self.line.len());
            for (slot, byte) in buf.iter_mut().zip(self.line.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    fn fast_config() -> ReaderConfig {
        ReaderConfig {
            initial_wait: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            timeout_iterations: 20,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    const FRAME: &[u8] = b"chat;;;0;;;EVAL;;;SUCCESS;;;2;;@@&&";

    #[test]
    fn reads_single_burst() {
        let clock = Rc::new(ManualClock::default());
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, FRAME)]);
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn reassembles_terminator_split_across_bursts() {
        let clock = Rc::new(ManualClock::default());
        let (head, tail) = FRAME.split_at(FRAME.len() - 3);
        let mut transport =
            ScriptedTransport::new(clock.clone(), vec![(0, head), (200, tail)]);
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
    }

    #[test]
    fn waits_for_count_to_settle() {
        let clock = Rc::new(ManualClock::default());
        // A new byte shows up between every pair of polls for a while.
        let schedule: Vec<(u64, &[u8])> = FRAME
            .chunks(4)
            .enumerate()
            .map(|(i, chunk)| (50 + (i as u64) * 10, chunk))
            .collect();
        let mut transport = ScriptedTransport::new(clock.clone(), schedule);
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
    }

    #[test]
    fn early_settle_on_partial_frame_keeps_reading() {
        let clock = Rc::new(ManualClock::default());
        let (head, tail) = FRAME.split_at(10);
        let mut transport =
            ScriptedTransport::new(clock.clone(), vec![(0, head), (120, tail)]);
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
    }

    #[test]
    fn drops_bytes_after_terminator() {
        let clock = Rc::new(ManualClock::default());
        let mut wire = FRAME.to_vec();
        wire.extend_from_slice(b"noise");
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, wire.as_slice())]);
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn times_out_with_partial_and_marker() {
        let clock = Rc::new(ManualClock::default());
        let mut transport =
            ScriptedTransport::new(clock.clone(), vec![(0, b"chat;;;0;;;EV".as_slice())]);
        let mut reader = FrameReader::with_config(fast_config());

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        match err {
            ReadError::Timeout {
                iterations,
                partial,
                ..
            } => {
                assert_eq!(iterations, 20);
                assert_eq!(partial.as_ref(), b"chat;;;0;;;EVTIMEOUT");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn timeout_is_bounded_by_iterations() {
        let clock = Rc::new(ManualClock::default());
        let mut transport = ScriptedTransport::new(clock.clone(), Vec::new());
        let mut reader = FrameReader::with_config(fast_config());

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        assert!(err.is_timeout());
        // initial wait plus one poll interval per iteration
        assert_eq!(clock.now_ticks(), 50 + 20 * 10);
        assert_eq!(clock.waits.get(), 21);
    }

    #[test]
    fn unsettled_line_is_drained_on_timeout() {
        let clock = Rc::new(ManualClock::default());
        let mut transport = ScriptedTransport::new(clock.clone(), Vec::new());
        transport.trickle = true;
        let mut reader = FrameReader::with_config(fast_config());

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        match err {
            ReadError::Timeout {
                partial, drained, ..
            } => {
                assert_eq!(partial.as_ref(), TIMEOUT_MARKER);
                assert!(drained > 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn next_read_after_timeout_starts_clean() {
        let clock = Rc::new(ManualClock::default());
        let mut transport =
            ScriptedTransport::new(clock.clone(), vec![(0, b"stale;;;garbage".as_slice())]);
        let mut reader = FrameReader::with_config(fast_config());

        assert!(reader.read_frame(&mut transport, &*clock).is_err());
        assert!(reader.buffer().is_empty());

        let later = clock.now_ticks() + 1;
        transport.schedule.push_back((later, FRAME.to_vec()));
        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
    }

    #[test]
    fn oversized_input_is_rejected() {
        let clock = Rc::new(ManualClock::default());
        let big = vec![b'x'; 256];
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, big.as_slice())]);
        let mut reader = FrameReader::with_config(ReaderConfig {
            max_frame_size: 64,
            ..fast_config()
        });

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        assert!(matches!(err, ReadError::FrameTooLarge { size: 256, max: 64 }));
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn trailing_noise_does_not_count_against_limit() {
        let clock = Rc::new(ManualClock::default());
        let mut wire = FRAME.to_vec();
        wire.extend_from_slice(&[b'~'; 200]);
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, wire.as_slice())]);
        let mut reader = FrameReader::with_config(ReaderConfig {
            max_frame_size: 64,
            ..fast_config()
        });

        let frame = reader.read_frame(&mut transport, &*clock).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn terminated_frame_over_limit_is_rejected() {
        let clock = Rc::new(ManualClock::default());
        let mut reader = FrameReader::with_config(ReaderConfig {
            max_frame_size: FRAME.len() - 1,
            ..fast_config()
        });
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, FRAME)]);

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        assert!(matches!(err, ReadError::FrameTooLarge { size, .. } if size == FRAME.len()));
    }

    #[test]
    fn transport_failure_propagates_and_clears() {
        let clock = Rc::new(ManualClock::default());
        let mut transport = ScriptedTransport::new(clock.clone(), vec![(0, FRAME)]);
        transport.fail_reads = true;
        let mut reader = FrameReader::with_config(fast_config());

        let err = reader.read_frame(&mut transport, &*clock).unwrap_err();

        assert!(matches!(err, ReadError::Transport(TransportError::Closed)));
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn scan_finds_terminator_across_appends() {
        let mut buffer = ReceiveBuffer::with_capacity(16);
        buffer.extend(b"abc;;@");
        assert_eq!(buffer.scan(), None);
        assert!(!buffer.terminator_seen());
        buffer.extend(b"@&&rest");
        assert_eq!(buffer.scan(), Some(9));
        assert!(buffer.terminator_seen());
    }

    #[test]
    fn worst_case_wait_matches_budget() {
        let cfg = fast_config();
        assert_eq!(cfg.worst_case_wait(), Duration::from_millis(250));
    }

    #[test]
    fn reads_over_socket_pair() {
        let (mut remote, mut local) = StreamTransport::pair().unwrap();
        let writer = std::thread::spawn(move || {
            let (head, tail) = FRAME.split_at(12);
            remote.write(head).unwrap();
            std::thread::sleep(Duration::from_millis(20));
            remote.write(tail).unwrap();
            remote
        });

        let mut reader = FrameReader::with_config(ReaderConfig {
            initial_wait: Duration::from_millis(1),
            poll_interval: Duration::from_millis(2),
            timeout_iterations: 2000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        });
        let frame = reader.read_frame(&mut local, &SystemClock::new()).unwrap();

        assert_eq!(frame.as_ref(), FRAME);
        let _remote = writer.join().unwrap();
    }

    #[test]
    fn boxed_trait_objects_are_accepted() {
        let clock = Rc::new(ManualClock::default());
        let mut transport: Box<dyn Transport> =
            Box::new(ScriptedTransport::new(clock.clone(), vec![(0, FRAME)]));
        let dyn_clock: &dyn Clock = &*clock;
        let mut reader = FrameReader::with_config(fast_config());

        let frame = reader.read_frame(&mut transport, dyn_clock).unwrap();
        assert_eq!(frame.as_ref(), FRAME);
    }
}
