use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// TCP transport for serial device servers (`ser2net`, `socat TCP-LISTEN`).
pub struct TcpLink {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpLink {
    /// Bind and listen on a TCP address. Port 0 picks an ephemeral port.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            address: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming host connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted tcp connection");
        Ok(LinkStream::from_tcp(stream))
    }

    /// Connect to a TCP address (blocking), trying each resolved address.
    pub fn connect(addr: &str) -> Result<LinkStream> {
        let resolved = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
            address: addr.to_string(),
            source: e,
        })?;

        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "address resolved to no socket addresses",
        );
        for candidate in resolved {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    debug!(%candidate, "connected over tcp");
                    return Ok(LinkStream::from_tcp(stream));
                }
                Err(err) => last_err = err,
            }
        }
        Err(TransportError::Connect {
            address: addr.to_string(),
            source: last_err,
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn bind_accept_connect_loopback() {
        let listener = TcpLink::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();

        let handle = std::thread::spawn(move || {
            let mut client = TcpLink::connect(&addr).unwrap();
            client.write_all(&[0x5A, 0x04, 0x00, 0x03, 0x00]).unwrap();
        });

        let mut server = listener.accept().unwrap();
        assert_eq!(server.transport_name(), "tcp");
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(buf[3], 0x03);
        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_maps_to_connect_error() {
        let listener = TcpLink::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        drop(listener);

        let result = TcpLink::connect(&addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
