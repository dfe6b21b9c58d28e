use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// A [`Transport`] over any blocking file-descriptor stream.
///
/// The pending byte count comes from `FIONREAD`, so the same type serves Unix
/// sockets, TCP sockets, and serial TTYs.
pub struct StreamTransport<S> {
    inner: S,
    kind: &'static str,
}

impl<S: Read + Write + AsRawFd> StreamTransport<S> {
    /// Wrap an already-connected stream.
    pub fn new(inner: S) -> Self {
        Self::with_kind(inner, "stream")
    }

    pub(crate) fn with_kind(inner: S, kind: &'static str) -> Self {
        Self { inner, kind }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        self.kind
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl StreamTransport<UnixStream> {
    /// Connect to a companion listening on a Unix domain socket.
    pub fn connect_unix(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            target: path.display().to_string(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(Self::with_kind(stream, "unix-domain-socket"))
    }

    /// A connected pair of in-process endpoints.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((
            Self::with_kind(left, "unix-domain-socket"),
            Self::with_kind(right, "unix-domain-socket"),
        ))
    }
}

impl StreamTransport<TcpStream> {
    /// Connect to a companion listening on TCP (`host:port`).
    pub fn connect_tcp(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            target: addr.to_string(),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected to tcp endpoint");
        Ok(Self::with_kind(stream, "tcp"))
    }
}

impl<S: Read + Write + AsRawFd> Transport for StreamTransport<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn bytes_available(&mut self) -> Result<usize> {
        pending_bytes(self.inner.as_raw_fd()).map_err(TransportError::Io)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn is_closed(&mut self) -> Result<bool> {
        hung_up(self.inner.as_raw_fd()).map_err(TransportError::Io)
    }
}

impl<S> std::fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("type", &self.kind)
            .finish()
    }
}

fn pending_bytes(fd: RawFd) -> std::io::Result<usize> {
    let mut count: libc::c_int = 0;

    // SAFETY: `fd` is an open descriptor owned by the wrapped stream and `count`
    // is a valid writable `c_int`, which is what FIONREAD stores into.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut count as *mut libc::c_int) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(usize::try_from(count).unwrap_or(0))
}

fn hung_up(fd: RawFd) -> std::io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: `pfd` is a single valid pollfd and the timeout of 0 never blocks.
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if rc == 0 {
        return Ok(false);
    }
    if pfd.revents & libc::POLLNVAL != 0 {
        return Ok(true);
    }
    if pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLIN) != 0 {
        // Readable with nothing pending means EOF. Data still queued after a
        // hangup must be readable first.
        return Ok(pending_bytes(fd)? == 0);
    }
    Ok(false)
}
