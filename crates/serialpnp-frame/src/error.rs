/// Errors that can occur during packet framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared packet length is below the header size or above the buffer limit.
    #[error("invalid packet length {length} (min {min}, max {max})")]
    BadLength {
        length: usize,
        min: usize,
        max: usize,
    },

    /// A complete packet carried a type byte outside the protocol.
    #[error("unknown packet type 0x{0:02x}")]
    UnknownPacketType(u8),

    /// The packet exceeds the configured maximum size.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Framing errors cost one packet; the stream stays usable.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::BadLength { .. } | FrameError::UnknownPacketType(_)
        )
    }

    /// The transport read or write timed out before a packet completed.
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
