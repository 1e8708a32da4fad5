use serialpnp_descriptor::ResponseStatus;

/// Errors that can occur in host session operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialpnp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serialpnp_frame::FrameError),

    /// The device descriptor could not be decoded.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] serialpnp_descriptor::DescriptorError),

    /// A value did not match its schema or could not be converted.
    #[error("value error: {0}")]
    Value(#[from] serialpnp_descriptor::ValueError),

    /// Reset or descriptor discovery exhausted its attempts.
    #[error("{stage} failed after {attempts} attempts")]
    ConnectFailed { stage: &'static str, attempts: u32 },

    /// No response arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No interface at this index in the device descriptor.
    #[error("unknown interface index {0}")]
    UnknownInterface(u8),

    /// No interface with this id in the device descriptor.
    #[error("unknown interface '{0}'")]
    UnknownInterfaceId(String),

    /// No property with this name on the interface.
    #[error("unknown property '{name}' on interface {interface}")]
    UnknownProperty { interface: u8, name: String },

    /// No command with this name on the interface.
    #[error("unknown command '{name}' on interface {interface}")]
    UnknownCommand { interface: u8, name: String },

    /// The property is not writeable.
    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    /// The device answered with a failure status.
    #[error("device rejected '{name}': {status}")]
    Remote { name: String, status: ResponseStatus },

    /// The link to the device is gone.
    #[error("device disconnected: {0}")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, HostError>;
