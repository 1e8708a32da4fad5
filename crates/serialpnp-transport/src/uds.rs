use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// `sockaddr_un.sun_path` capacity.
#[cfg(target_os = "linux")]
const SUN_PATH_MAX: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_MAX: usize = 104;

/// Socket files are created owner-only.
const SOCKET_MODE: u32 = 0o600;

/// Unix domain socket listener, used by simulated peripherals and by PTY
/// bridges such as `socat UNIX-LISTEN:... /dev/ttyUSB0`.
pub struct UnixDomainSocket {
    listener: UnixListener,
    file: SocketFile,
}

/// The socket file a listener created, identified by device and inode so a
/// path that was replaced behind our back is never removed.
struct SocketFile {
    path: PathBuf,
    dev: u64,
    ino: u64,
}

impl SocketFile {
    /// Make `path` available for binding: reject over-long paths and non-socket
    /// files, and clear a stale socket left by an earlier run.
    fn prepare(path: &Path) -> Result<()> {
        let len = path.as_os_str().len();
        if len >= SUN_PATH_MAX {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len,
                max: SUN_PATH_MAX,
            });
        }

        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => {
                debug!(?path, "removing stale socket");
                fs::remove_file(path).map_err(|e| bind_error(path, e))
            }
            Ok(_) => Err(bind_error(
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path exists and is not a socket"),
            )),
            Err(_) => Ok(()),
        }
    }

    fn record(path: PathBuf) -> Result<Self> {
        fs::set_permissions(&path, fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(|e| bind_error(&path, e))?;
        let meta = fs::symlink_metadata(&path).map_err(|e| bind_error(&path, e))?;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
            path,
        })
    }

    fn still_ours(&self) -> bool {
        fs::symlink_metadata(&self.path).is_ok_and(|meta| {
            meta.file_type().is_socket() && meta.dev() == self.dev && meta.ino() == self.ino
        })
    }
}

impl UnixDomainSocket {
    /// Bind a listener at `path`. The socket file is removed again when the
    /// listener is dropped.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        SocketFile::prepare(path)?;
        let listener = UnixListener::bind(path).map_err(|e| bind_error(path, e))?;
        let file = SocketFile::record(path.to_path_buf())?;
        info!(?path, "peripheral socket listening");
        Ok(Self { listener, file })
    }

    /// Wait for the next host connection.
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.file.path, "host connected");
        Ok(LinkStream::from_unix(stream))
    }

    /// Open a link to a peripheral listening at `path`.
    pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            address: path.display().to_string(),
            source,
        })?;
        debug!(?path, "connected to peripheral socket");
        Ok(LinkStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if self.file.still_ours() {
            let _ = fs::remove_file(&self.file.path);
        } else {
            debug!(path = ?self.file.path, "socket path replaced; leaving it");
        }
    }
}

fn bind_error(path: &Path, source: io::Error) -> TransportError {
    TransportError::Bind {
        address: path.display().to_string(),
        source,
    }
}
