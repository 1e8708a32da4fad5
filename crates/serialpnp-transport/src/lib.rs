//! Byte-stream links for the SerialPnP protocol.
//!
//! SerialPnP runs over any reliable, ordered byte stream. This crate provides
//! the connected stream type used by the host and peripheral layers:
//! - Unix domain sockets (local simulators, `socat` PTY bridges)
//! - TCP (serial device servers such as `ser2net`)
//!
//! This is the lowest layer of serialpnp. Everything else builds on top of
//! the [`LinkStream`] type provided here, or on any `Read + Write` pair.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, LinkListener};
pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::TcpLink;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
