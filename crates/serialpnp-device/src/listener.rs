use serialpnp_transport::{Endpoint, LinkListener, LinkStream};
use tracing::{info, warn};

use crate::builder::RuntimeBuilder;
use crate::error::Result;
use crate::runtime::Runtime;

/// Accepts host connections for a simulated peripheral.
pub struct DeviceListener {
    listener: LinkListener,
}

impl DeviceListener {
    /// Bind to `endpoint` (Unix socket path or TCP address).
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let listener = endpoint.bind()?;
        info!(endpoint = %listener.local_endpoint(), "device listening");
        Ok(Self { listener })
    }

    /// Endpoint a host should connect to. For `tcp:…:0` this carries the
    /// assigned port.
    pub fn local_endpoint(&self) -> Endpoint {
        self.listener.local_endpoint()
    }

    /// Accept the next host and make `builder` ready on its link.
    pub fn accept(&self, builder: RuntimeBuilder) -> Result<Runtime<LinkStream, LinkStream>> {
        let stream = self.listener.accept()?;
        info!(transport = stream.transport_name(), "host connected");
        builder.ready_link(stream)
    }
}

/// Serve hosts one at a time, building a fresh runtime for each connection.
///
/// A connection that fails is logged and the next one accepted; errors from
/// `bind`, `accept` or `factory` end the loop.
pub fn serve<F>(endpoint: &Endpoint, mut factory: F) -> Result<()>
where
    F: FnMut() -> Result<RuntimeBuilder>,
{
    let listener = DeviceListener::bind(endpoint)?;
    loop {
        let mut runtime = listener.accept(factory()?)?;
        if let Err(err) = runtime.run() {
            warn!(error = %err, "host session ended with an error");
        }
    }
}
