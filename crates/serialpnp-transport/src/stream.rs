use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::Result;

/// A connected link to a SerialPnP peer. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a Unix domain socket stream or a TCP stream carrying the
/// raw serial byte stream.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            LinkStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            LinkStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            LinkStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl LinkStream {
    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Wrap a connected TCP stream.
    ///
    /// Nagle is disabled: SerialPnP packets are small and latency-sensitive.
    pub fn from_tcp(stream: TcpStream) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(error = %err, "failed to disable nagle on tcp link");
        }
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }

    /// Create a connected pair of in-process links.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(a), Self::from_unix(b)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The host and peripheral layers read from one handle on a dedicated
    /// thread and write through another.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            LinkStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
        }
    }

    /// Shut down both directions of the link.
    ///
    /// Unblocks any thread currently reading from a clone of this stream.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.shutdown(std::net::Shutdown::Both),
            LinkStreamInner::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix",
            LinkStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut a, mut b) = LinkStream::pair().unwrap();
        a.write_all(&[0x5A, 0x04, 0x00]).unwrap();
        let mut buf = [0u8; 3];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x5A, 0x04, 0x00]);

        b.write_all(b"ok").unwrap();
        let mut back = [0u8; 2];
        a.read_exact(&mut back).unwrap();
        assert_eq!(&back, b"ok");
    }

    #[test]
    fn read_timeout_surfaces_as_would_block() {
        let (mut a, _b) = LinkStream::pair().unwrap();
        a.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let mut buf = [0u8; 1];
        let err = a.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn shutdown_unblocks_clone_reader() {
        let (a, _b) = LinkStream::pair().unwrap();
        let mut reader = a.try_clone().unwrap();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf).unwrap()
        });
        std::thread::sleep(Duration::from_millis(20));
        a.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn debug_names_transport() {
        let (a, _b) = LinkStream::pair().unwrap();
        assert_eq!(a.transport_name(), "unix");
        assert!(format!("{a:?}").contains("unix"));
    }
}
