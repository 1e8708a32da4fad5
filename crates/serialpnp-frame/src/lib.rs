//! Packet framing for the SerialPnP wire protocol.
//!
//! Every packet travels on the byte stream as:
//! - A start-of-frame marker (`0x5A`)
//! - A 4-byte header: total length (u16 LE, header included), packet type, reserved
//! - The packet body
//!
//! Header and body bytes equal to `0x5A` or the escape marker `0xEF` are sent as
//! `0xEF` followed by the byte minus one. The decoder resynchronizes on the
//! next start marker after any framing error, so a corrupted packet costs one
//! packet and never the session.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::PnpCodec;
pub use codec::{
    encode_frame, escape_into, DecodeState, FrameConfig, FrameDecoder, DEFAULT_MAX_PACKET_SIZE,
    ESCAPE, HEADER_SIZE, START_OF_FRAME,
};
pub use error::{FrameError, Result};
pub use packet::{Packet, PacketType};
pub use reader::{FrameStats, PacketReader};
pub use writer::PacketWriter;
