//! Serial line settings and TTY opening.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// Parity bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Line settings for a serial link. Default: 9600 baud, 8N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl SerialConfig {
    /// Check that the settings map onto something termios can express.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if baud_constant(self.baud).is_none() {
            return Err(format!("unsupported baud rate {}", self.baud));
        }
        if char_size(self.data_bits).is_none() {
            return Err(format!(
                "unsupported data bits {} (expected 5-8)",
                self.data_bits
            ));
        }
        Ok(())
    }
}

impl StreamTransport<File> {
    /// Open a serial device node and apply `config` in raw mode.
    pub fn open_serial(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref();
        config
            .validate()
            .map_err(|reason| TransportError::Configure {
                path: path.to_path_buf(),
                reason,
            })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;

        let fd = file.as_raw_fd();
        configure_line(fd, config).map_err(|reason| TransportError::Configure {
            path: path.to_path_buf(),
            reason,
        })?;
        clear_nonblocking(fd).map_err(|e| TransportError::Configure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!(
            ?path,
            baud = config.baud,
            data_bits = config.data_bits,
            parity = ?config.parity,
            stop_bits = ?config.stop_bits,
            "opened serial line"
        );
        Ok(Self::with_kind(file, "serial"))
    }
}

fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        300 => libc::B300,
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        _ => return None,
    };
    Some(speed)
}

fn char_size(data_bits: u8) -> Option<libc::tcflag_t> {
    match data_bits {
        5 => Some(libc::CS5),
        6 => Some(libc::CS6),
        7 => Some(libc::CS7),
        8 => Some(libc::CS8),
        _ => None,
    }
}

fn configure_line(fd: RawFd, config: &SerialConfig) -> std::result::Result<(), String> {
    let speed = baud_constant(config.baud)
        .ok_or_else(|| format!("unsupported baud rate {}", config.baud))?;
    let size = char_size(config.data_bits)
        .ok_or_else(|| format!("unsupported data bits {}", config.data_bits))?;

    // SAFETY: termios is a plain C struct; all-zero is a valid value that
    // tcgetattr overwrites before we read it.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor and `tio` is a valid writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(format!("tcgetattr: {}", std::io::Error::last_os_error()));
    }

    // SAFETY: `tio` is a valid termios obtained from tcgetattr.
    unsafe { libc::cfmakeraw(&mut tio) };

    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !libc::CSIZE;
    tio.c_cflag |= size;

    match config.parity {
        Parity::None => tio.c_cflag &= !(libc::PARENB | libc::PARODD),
        Parity::Even => {
            tio.c_cflag |= libc::PARENB;
            tio.c_cflag &= !libc::PARODD;
        }
        Parity::Odd => tio.c_cflag |= libc::PARENB | libc::PARODD,
    }

    match config.stop_bits {
        StopBits::One => tio.c_cflag &= !libc::CSTOPB,
        StopBits::Two => tio.c_cflag |= libc::CSTOPB,
    }

    // Reads return immediately with whatever is pending.
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios and `speed` is a libc baud constant.
    let speed_rc = unsafe { libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed) };
    if speed_rc != 0 {
        return Err(format!("cfsetspeed: {}", std::io::Error::last_os_error()));
    }

    // SAFETY: `fd` is open and `tio` is fully initialised.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(format!("tcsetattr: {}", std::io::Error::last_os_error()));
    }

    // SAFETY: `fd` is an open TTY descriptor.
    if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
        debug!("tcflush failed; continuing with stale line buffers");
    }

    Ok(())
}

fn clear_nonblocking(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: F_GETFL/F_SETFL on an open descriptor have no memory-safety preconditions.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_9600_8n1() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud, 9600);
        assert_eq!(cfg.data_bits, 8);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.stop_bits, StopBits::One);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_baud() {
        let cfg = SerialConfig {
            baud: 12345,
            ..SerialConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("12345"));
    }

    #[test]
    fn rejects_unsupported_data_bits() {
        let cfg = SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn open_missing_device_fails_with_open_error() {
        let path = format!("/dev/coprocwire-no-such-tty-{}", std::process::id());
        let err = StreamTransport::open_serial(&path, &SerialConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn invalid_config_fails_before_open() {
        let cfg = SerialConfig {
            baud: 1,
            ..SerialConfig::default()
        };
        let err = StreamTransport::open_serial("/dev/null", &cfg).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));
    }

    #[test]
    fn non_tty_is_rejected_at_configure() {
        let err = StreamTransport::open_serial("/dev/null", &SerialConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));
    }
}
