/// Errors that can occur in the peripheral runtime.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialpnp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serialpnp_frame::FrameError),

    /// The descriptor rejected a registration.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] serialpnp_descriptor::DescriptorError),

    /// A value did not match its schema.
    #[error("value error: {0}")]
    Value(#[from] serialpnp_descriptor::ValueError),

    /// The name is already registered on this interface.
    #[error("{kind} '{name}' already registered on interface {interface}")]
    Duplicate {
        interface: u8,
        kind: &'static str,
        name: String,
    },

    /// No event with this name was registered.
    #[error("unknown event '{name}' on interface {interface}")]
    UnknownEvent { interface: u8, name: String },
}

pub type Result<T> = std::result::Result<T, DeviceError>;
