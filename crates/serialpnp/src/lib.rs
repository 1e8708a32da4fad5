//! SerialPnP: self-describing peripherals over a framed byte stream.
//!
//! A peripheral publishes a binary descriptor of its interfaces (properties,
//! commands, events). A host resets the peripheral, fetches and decodes that
//! descriptor, then drives it by name.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream links (Unix sockets, TCP)
//! - [`frame`]: Start-of-frame/escape packet codec
//! - [`descriptor`]: Descriptor model, TLV codec and typed values
//! - [`host`]: Host session (behind `host` feature)
//! - [`device`]: Peripheral runtime (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use serialpnp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialpnp_frame::*;
}

/// Re-export descriptor types.
pub mod descriptor {
    pub use serialpnp_descriptor::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use serialpnp_host::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use serialpnp_device::*;
}
