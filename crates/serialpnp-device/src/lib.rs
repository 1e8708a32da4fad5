//! Peripheral side of the SerialPnP protocol.
//!
//! Register interfaces with their properties, commands and events on a
//! [`RuntimeBuilder`], then call [`RuntimeBuilder::ready`] to get a
//! [`Runtime`] that answers reset, descriptor, property and command requests
//! from a host. Events are sent with [`Runtime::send_event`] or an
//! [`EventEmitter`] from another thread.

pub mod builder;
pub mod config;
pub mod emitter;
pub mod error;
pub mod listener;
pub mod registry;
pub mod runtime;

pub use builder::RuntimeBuilder;
pub use config::RuntimeConfig;
pub use emitter::EventEmitter;
pub use error::{DeviceError, Result};
pub use listener::{serve, DeviceListener};
pub use registry::{CommandHandler, EntryKind, PropertyHandler};
pub use runtime::Runtime;
