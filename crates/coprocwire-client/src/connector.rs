use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[cfg(unix)]
use std::fs::File;
#[cfg(unix)]
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;

#[cfg(unix)]
use coprocwire_transport::{SerialConfig, StreamTransport, Transport};
#[cfg(unix)]
use tracing::info;

#[cfg(unix)]
use crate::client::CoprocessorClient;
#[cfg(unix)]
use crate::config::ClientConfig;
#[cfg(unix)]
use crate::error::Result;
use crate::error::ClientError;

/// A client over a transport chosen at runtime.
#[cfg(unix)]
pub type DynClient = CoprocessorClient<Box<dyn Transport + Send>>;

/// Where the companion process can be reached.
///
/// Parsed from `unix:<path>`, `tcp:<host>:<port>`, or
/// `serial:<device>[@<baud>]`. A bare path is taken as a Unix socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
    Serial { path: PathBuf, baud: Option<u32> },
}

impl FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = |reason: &str| ClientError::InvalidConfig(format!("endpoint {s:?}: {reason}"));

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            if addr.rsplit_once(':').is_none_or(|(host, port)| host.is_empty() || port.is_empty())
            {
                return Err(invalid("expected tcp:<host>:<port>"));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        if let Some(rest) = s.strip_prefix("serial:") {
            let (path, baud) = match rest.rsplit_once('@') {
                Some((path, baud)) => {
                    let baud = baud
                        .parse::<u32>()
                        .map_err(|_| invalid("baud rate must be an integer"))?;
                    (path, Some(baud))
                }
                None => (rest, None),
            };
            if path.is_empty() {
                return Err(invalid("missing device path"));
            }
            return Ok(Endpoint::Serial {
                path: PathBuf::from(path),
                baud,
            });
        }
        if s.is_empty() {
            return Err(invalid("empty"));
        }
        Ok(Endpoint::Unix(PathBuf::from(s)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
            Endpoint::Serial { path, baud: None } => write!(f, "serial:{}", path.display()),
            Endpoint::Serial {
                path,
                baud: Some(baud),
            } => write!(f, "serial:{}@{baud}", path.display()),
        }
    }
}

/// Connect to a companion listening on a Unix socket.
#[cfg(unix)]
pub fn connect_unix(
    path: impl AsRef<Path>,
    config: ClientConfig,
) -> Result<CoprocessorClient<StreamTransport<UnixStream>>> {
    let transport = StreamTransport::connect_unix(path)?;
    CoprocessorClient::new(transport, config)
}

/// Connect to a companion listening on TCP.
#[cfg(unix)]
pub fn connect_tcp(
    addr: &str,
    config: ClientConfig,
) -> Result<CoprocessorClient<StreamTransport<TcpStream>>> {
    let transport = StreamTransport::connect_tcp(addr)?;
    CoprocessorClient::new(transport, config)
}

/// Open a serial line to the companion.
#[cfg(unix)]
pub fn open_serial(
    path: impl AsRef<Path>,
    serial: &SerialConfig,
    config: ClientConfig,
) -> Result<CoprocessorClient<StreamTransport<File>>> {
    let transport = StreamTransport::open_serial(path, serial)?;
    CoprocessorClient::new(transport, config)
}

/// Connect to any [`Endpoint`].
#[cfg(unix)]
pub fn connect(endpoint: &Endpoint, config: ClientConfig) -> Result<DynClient> {
    config.validate()?;

    let transport: Box<dyn Transport + Send> = match endpoint {
        Endpoint::Unix(path) => Box::new(StreamTransport::connect_unix(path)?),
        Endpoint::Tcp(addr) => Box::new(StreamTransport::connect_tcp(addr)?),
        Endpoint::Serial { path, baud } => {
            let serial = SerialConfig {
                baud: baud.unwrap_or(SerialConfig::default().baud),
                ..SerialConfig::default()
            };
            Box::new(StreamTransport::open_serial(path, &serial)?)
        }
    };
    info!(%endpoint, application_id = %config.application_id, "connected to companion");
    CoprocessorClient::new(transport, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoint_forms() {
        assert_eq!(
            "unix:/tmp/c.sock".parse::<Endpoint>().expect("unix"),
            Endpoint::Unix(PathBuf::from("/tmp/c.sock"))
        );
        assert_eq!(
            "/tmp/c.sock".parse::<Endpoint>().expect("bare path"),
            Endpoint::Unix(PathBuf::from("/tmp/c.sock"))
        );
        assert_eq!(
            "tcp:127.0.0.1:7000".parse::<Endpoint>().expect("tcp"),
            Endpoint::Tcp("127.0.0.1:7000".to_string())
        );
        assert_eq!(
            "serial:/dev/ttyS0@19200".parse::<Endpoint>().expect("serial"),
            Endpoint::Serial {
                path: PathBuf::from("/dev/ttyS0"),
                baud: Some(19200)
            }
        );
        assert_eq!(
            "serial:/dev/ttyUSB0".parse::<Endpoint>().expect("serial"),
            Endpoint::Serial {
                path: PathBuf::from("/dev/ttyUSB0"),
                baud: None
            }
        );
    }

    #[test]
    fn rejects_malformed_endpoints() {
        for raw in ["", "unix:", "tcp:localhost", "tcp::80", "serial:", "serial:/dev/x@fast"] {
            let err = raw.parse::<Endpoint>().expect_err(raw);
            assert!(matches!(err, ClientError::InvalidConfig(_)), "{raw}");
        }
    }

    #[test]
    fn endpoint_display_round_trips() {
        for raw in ["unix:/tmp/a.sock", "tcp:host:1", "serial:/dev/ttyS1@9600"] {
            let endpoint: Endpoint = raw.parse().expect("endpoint");
            assert_eq!(endpoint.to_string(), raw);
        }
    }

    #[cfg(unix)]
    #[test]
    fn connect_to_missing_socket_fails_with_transport_error() {
        let err = connect_unix("/nonexistent/coprocwire.sock", ClientConfig::default())
            .expect_err("missing socket");
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[cfg(unix)]
    #[test]
    fn connect_rejects_bad_config_before_opening() {
        let endpoint = Endpoint::Unix(PathBuf::from("/nonexistent/coprocwire.sock"));
        let Err(err) = connect(&endpoint, ClientConfig::new("")) else {
            panic!("bad config should be rejected");
        };
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }
}
