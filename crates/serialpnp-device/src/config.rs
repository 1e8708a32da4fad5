use serialpnp_frame::FrameConfig;

/// Peripheral runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Packet size limit and link timeouts. The descriptor must fit
    /// `frame.max_packet_size` minus the packet header.
    pub frame: FrameConfig,
    /// Send an unsolicited RESET_RESPONSE when the runtime becomes ready.
    /// Default: true.
    pub announce_ready: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            announce_ready: true,
        }
    }
}
