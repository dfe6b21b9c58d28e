use std::time::{Duration, Instant};

use crate::error::Result;

/// A duplex byte channel with no framing of its own.
///
/// Implementations must never block in [`Transport::bytes_available`] or
/// [`Transport::read`] when no data is pending: callers poll, they do not
/// park on the channel.
pub trait Transport {
    /// Write every byte of `bytes` to the channel.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes that are already pending.
    ///
    /// Returns the number of bytes copied into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether the remote side has hung up.
    ///
    /// Links that cannot tell (raw serial lines, in-memory doubles) keep the
    /// default of `false`.
    fn is_closed(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Discard everything currently pending on the channel.
    ///
    /// Returns the number of bytes thrown away.
    fn discard_pending(&mut self) -> Result<usize> {
        let mut scratch = [0u8; 512];
        let mut discarded = 0usize;
        loop {
            let available = self.bytes_available()?;
            if available == 0 {
                return Ok(discarded);
            }
            let want = available.min(scratch.len());
            let read = self.read(&mut scratch[..want])?;
            if read == 0 {
                return Ok(discarded);
            }
            discarded += read;
        }
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn is_closed(&mut self) -> Result<bool> {
        (**self).is_closed()
    }

    fn discard_pending(&mut self) -> Result<usize> {
        (**self).discard_pending()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn is_closed(&mut self) -> Result<bool> {
        (**self).is_closed()
    }

    fn discard_pending(&mut self) -> Result<usize> {
        (**self).discard_pending()
    }
}

/// Monotonic tick source plus a way to pause the calling thread.
pub trait Clock {
    /// Monotonic tick count. Units are implementation-defined.
    fn now_ticks(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn wait(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ticks(&self) -> u64 {
        (**self).now_ticks()
    }

    fn wait(&self, duration: Duration) {
        (**self).wait(duration)
    }
}

/// Wall clock backed by [`Instant`]. Ticks are milliseconds since creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ticks(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    struct QueueTransport {
        pending: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl Transport for QueueTransport {
        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn bytes_available(&mut self) -> Result<usize> {
            Ok(self.pending.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.pending.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.pending.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    #[test]
    fn discard_pending_empties_channel() {
        let mut transport = QueueTransport {
            pending: (0..2000u32).map(|i| (i % 251) as u8).collect(),
            written: Vec::new(),
        };

        let discarded = transport.discard_pending().unwrap();
        assert_eq!(discarded, 2000);
        assert_eq!(transport.bytes_available().unwrap(), 0);
    }

    /// Flushes its line in one step, like `tcflush` on a TTY.
    struct FlushingTransport {
        pending: usize,
        flushes: u32,
    }

    impl Transport for FlushingTransport {
        fn write(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }

        fn bytes_available(&mut self) -> Result<usize> {
            Ok(self.pending)
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn discard_pending(&mut self) -> Result<usize> {
            self.flushes += 1;
            Ok(std::mem::take(&mut self.pending))
        }
    }

    #[test]
    fn wrappers_forward_discard_override() {
        let mut inner = FlushingTransport {
            pending: 7,
            flushes: 0,
        };
        assert_eq!((&mut inner).discard_pending().unwrap(), 7);
        assert_eq!(inner.flushes, 1);

        let mut boxed: Box<dyn Transport> = Box::new(FlushingTransport {
            pending: 3,
            flushes: 0,
        });
        assert_eq!(boxed.discard_pending().unwrap(), 3);
        assert_eq!(boxed.bytes_available().unwrap(), 0);
    }

    fn write_through<T: Transport>(mut transport: T, bytes: &[u8]) -> usize {
        transport.write(bytes).unwrap();
        transport.bytes_available().unwrap()
    }

    #[test]
    fn mut_ref_forwards_to_inner() {
        let mut transport = QueueTransport {
            pending: VecDeque::from(b"ab".to_vec()),
            written: Vec::new(),
        };

        let available = write_through(&mut transport, b"xyz");

        assert_eq!(available, 2);
        assert_eq!(transport.written, b"xyz");
    }

    #[test]
    fn boxed_transport_is_usable_as_trait_object() {
        let mut boxed: Box<dyn Transport> = Box::new(QueueTransport {
            pending: VecDeque::from(b"hi".to_vec()),
            written: Vec::new(),
        });

        let mut buf = [0u8; 4];
        let n = boxed.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn system_clock_ticks_are_monotonic() {
        let clock = SystemClock::new();
        let before = clock.now_ticks();
        clock.wait(Duration::from_millis(5));
        let after = clock.now_ticks();
        assert!(after >= before);
    }
}
