use serialpnp_transport::Endpoint;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::HostSession;

/// Connect to a device at `endpoint` and run discovery with default timing.
pub fn connect(endpoint: &Endpoint) -> Result<HostSession> {
    connect_with_config(endpoint, SessionConfig::default())
}

/// Connect with explicit timing and retry policy.
pub fn connect_with_config(endpoint: &Endpoint, config: SessionConfig) -> Result<HostSession> {
    let stream = endpoint.connect()?;
    info!(%endpoint, transport = stream.transport_name(), "connected to device");
    HostSession::establish_link(stream, config)
}
