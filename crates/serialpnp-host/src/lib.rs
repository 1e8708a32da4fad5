//! Host side of the SerialPnP protocol.
//!
//! Connect to a device, reset it, discover its capability table, then write
//! properties, invoke commands and subscribe to events and property
//! notifications. One receive thread per session owns all reads.

pub mod config;
pub mod connector;
mod correlation;
pub mod discovery;
pub mod error;
pub mod notification;
pub mod session;

pub use config::SessionConfig;
pub use connector::{connect, connect_with_config};
pub use discovery::{fetch_descriptor, reset_device};
pub use error::{HostError, Result};
pub use notification::Notification;
pub use session::{CommandResponse, HostSession, SessionState};
