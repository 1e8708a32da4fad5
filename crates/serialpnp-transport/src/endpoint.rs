use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;
use crate::tcp::TcpLink;

#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Address of a SerialPnP link.
///
/// Accepted forms:
/// - `unix:/run/serialpnp/dev0.sock`
/// - `tcp:127.0.0.1:4000`
/// - a bare path, treated as a Unix socket path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Open a client connection to this endpoint.
    pub fn connect(&self) -> Result<LinkStream> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
            Endpoint::Tcp(addr) => TcpLink::connect(addr),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<LinkListener> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(LinkListener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
            Endpoint::Tcp(addr) => Ok(LinkListener::Tcp(TcpLink::bind(addr)?)),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: s.to_string(),
            reason,
        };

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    return Ok(Endpoint::Tcp(addr.to_string()));
                }
                _ => return Err(invalid("expected tcp:<host>:<port>")),
            }
        }
        if s.is_empty() {
            return Err(invalid("empty endpoint"));
        }
        Ok(Endpoint::Unix(PathBuf::from(s)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// A bound listener for any endpoint kind.
pub enum LinkListener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpLink),
}

impl LinkListener {
    /// Accept the next incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        match self {
            #[cfg(unix)]
            LinkListener::Unix(listener) => listener.accept(),
            LinkListener::Tcp(listener) => listener.accept(),
        }
    }

    /// The endpoint actually bound (resolves ephemeral TCP ports).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            LinkListener::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
            LinkListener::Tcp(listener) => Endpoint::Tcp(listener.local_addr().to_string()),
        }
    }
}
