use std::time::Duration;

use serialpnp_frame::FrameConfig;

/// Timing and retry policy for a host session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Attempts for each of reset and descriptor discovery. Default: 3.
    pub reset_attempts: u32,
    /// Pause between discovery attempts. Default: 5 s.
    pub retry_interval: Duration,
    /// How long one discovery attempt waits for its response. Default: 5 s.
    pub response_timeout: Duration,
    /// How long a command waits for its response. Default: 60 s.
    pub command_timeout: Duration,
    /// Read timeout of the receive loop; bounds shutdown latency. Default: 100 ms.
    pub poll_interval: Duration,
    /// Packet size limits for the link.
    pub frame: FrameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_attempts: 3,
            retry_interval: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            frame: FrameConfig::default(),
        }
    }
}
