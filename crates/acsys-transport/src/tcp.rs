use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::BusStream;

/// Default gateway, `host:port`.
pub const DEFAULT_GATEWAY: &str = "firus-gate.fnal.gov:6802";

/// Default acnetd TCP port.
pub const DEFAULT_PORT: u16 = 6802;

/// Network location of an acnetd gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAddr {
    pub host: String,
    pub port: u16,
}

impl GatewayAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for GatewayAddr {
    fn default() -> Self {
        Self::new("firus-gate.fnal.gov", DEFAULT_PORT)
    }
}

impl fmt::Display for GatewayAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for GatewayAddr {
    type Err = String;

    /// Parses `host:port`, or a bare `host` using [`DEFAULT_PORT`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("gateway address must not be empty".to_string());
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid gateway port: {port}"))?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(format!("invalid gateway address: {s}")),
            None => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}

/// Connect to a gateway (blocking, no connect timeout).
pub fn connect(addr: &GatewayAddr) -> Result<BusStream> {
    connect_timeout(addr, None)
}

/// Connect to a gateway, trying every resolved address in turn.
pub fn connect_timeout(addr: &GatewayAddr, timeout: Option<Duration>) -> Result<BusStream> {
    let target = addr.to_string();
    let candidates = (addr.host.as_str(), addr.port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: target.clone(),
            source,
        })?;

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                debug!(gateway = %target, %candidate, "connected to gateway");
                return BusStream::from_tcp(stream);
            }
            Err(err) => {
                debug!(gateway = %target, %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        addr: target,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "gateway address resolved to nothing",
            )
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn local_listener() -> (TcpListener, GatewayAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, GatewayAddr::new("127.0.0.1", port))
    }

    #[test]
    fn test_connect_and_exchange() {
        let (listener, addr) = local_listener();

        let handle = std::thread::spawn(move || {
            let mut client = connect(&addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut server, _) = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_disables_nagle() {
        let (listener, addr) = local_listener();
        let client = connect_timeout(&addr, Some(Duration::from_secs(1))).unwrap();
        let _server = listener.accept().unwrap();
        assert!(client.nodelay().unwrap());
    }

    #[test]
    fn test_connect_refused() {
        let (listener, addr) = local_listener();
        drop(listener);
        let result = connect(&addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_shutdown_wakes_reader() {
        let (listener, addr) = local_listener();
        let client = connect(&addr).unwrap();
        let _server = listener.accept().unwrap();

        let mut reader = client.try_clone().unwrap();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.read(&mut buf).unwrap_or(0)
        });

        client.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn test_parse_gateway_addr() {
        let addr: GatewayAddr = "gate.example.org:7000".parse().unwrap();
        assert_eq!(addr, GatewayAddr::new("gate.example.org", 7000));

        let bare: GatewayAddr = "gate.example.org".parse().unwrap();
        assert_eq!(bare.port, DEFAULT_PORT);

        assert!("".parse::<GatewayAddr>().is_err());
        assert!(":7000".parse::<GatewayAddr>().is_err());
        assert!("gate:notaport".parse::<GatewayAddr>().is_err());
    }

    #[test]
    fn test_default_gateway_matches_constant() {
        assert_eq!(GatewayAddr::default().to_string(), DEFAULT_GATEWAY);
    }
}
