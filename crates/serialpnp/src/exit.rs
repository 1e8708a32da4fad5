use std::fmt;
use std::io;

use serialpnp_descriptor::ValueError;
use serialpnp_device::DeviceError;
use serialpnp_frame::FrameError;
use serialpnp_host::HostError;
use serialpnp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PacketTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn value_error(context: &str, err: ValueError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Transport(err) => transport_error(context, err),
        HostError::Frame(err) => frame_error(context, err),
        HostError::Value(err) => value_error(context, err),
        HostError::Descriptor(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        HostError::ConnectFailed { .. } | HostError::Timeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        HostError::UnknownInterface(_)
        | HostError::UnknownInterfaceId(_)
        | HostError::UnknownProperty { .. }
        | HostError::UnknownCommand { .. }
        | HostError::ReadOnly(_) => CliError::new(USAGE, format!("{context}: {err}")),
        HostError::Remote { .. } | HostError::Disconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Transport(err) => transport_error(context, err),
        DeviceError::Frame(err) => frame_error(context, err),
        DeviceError::Value(err) => value_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn host_errors_map_to_exit_codes() {
        assert_eq!(
            host_error("x", HostError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            host_error(
                "x",
                HostError::ConnectFailed {
                    stage: "reset",
                    attempts: 3
                }
            )
            .code,
            TIMEOUT
        );
        assert_eq!(host_error("x", HostError::ReadOnly("serial".into())).code, USAGE);
        assert_eq!(
            host_error("x", HostError::Value(ValueError::InvalidUtf8)).code,
            DATA_INVALID
        );
    }

    #[test]
    fn missing_socket_is_a_transport_error() {
        let err = TransportError::Connect {
            address: "/tmp/none.sock".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(transport_error("connect", err).code, TRANSPORT_ERROR);
    }
}
