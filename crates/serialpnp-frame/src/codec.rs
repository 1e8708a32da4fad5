use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::{Packet, PacketType};

/// Packet header: length (2) + type (1) + reserved (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Start-of-frame marker. Never appears unescaped inside a packet.
pub const START_OF_FRAME: u8 = 0x5A;

/// Escape marker. The following byte is the original minus one.
pub const ESCAPE: u8 = 0xEF;

/// Default maximum packet size (header included): 4 KiB.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4096;

/// Append `src` to `dst` with SOF/escape bytes escaped.
pub fn escape_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(src.len());
    for &byte in src {
        if byte == START_OF_FRAME || byte == ESCAPE {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte - 1);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Encode a packet into its on-wire form.
///
/// Wire format (before escaping):
/// ```text
/// ┌──────┬─────────────┬────────┬──────────┬──────────────┐
/// │ 0x5A │ Length      │ Type   │ Reserved │ Body          │
/// │      │ (2B LE)     │ (1B)   │ (1B)     │ (Length - 4)  │
/// └──────┴─────────────┴────────┴──────────┴──────────────┘
/// ```
/// Everything after the start marker is escaped.
pub fn encode_frame(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    let length = packet.length();
    if length > u16::MAX as usize {
        return Err(FrameError::PacketTooLarge {
            size: length,
            max: u16::MAX as usize,
        });
    }

    let mut header = [0u8; HEADER_SIZE];
    header[..2].copy_from_slice(&(length as u16).to_le_bytes());
    header[2] = packet.packet_type.as_u8();
    header[3] = packet.reserved;

    // Worst case every byte is escaped.
    dst.reserve(1 + 2 * length);
    dst.put_u8(START_OF_FRAME);
    escape_into(&header, dst);
    escape_into(&packet.body, dst);
    Ok(())
}

/// Decoder position in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for a start-of-frame marker; other bytes are ignored.
    AwaitFrame,
    /// Inside a frame, collecting unescaped packet bytes.
    Accumulating,
    /// Inside a frame, right after an escape marker. The next byte is
    /// stored plus one.
    Escaped,
}

/// Byte-at-a-time packet decoder.
///
/// Feed bytes with [`FrameDecoder::push`]. A complete packet is returned as
/// soon as its last byte arrives. Framing errors discard the partial packet
/// and put the decoder back in [`DecodeState::AwaitFrame`].
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    state: DecodeState,
    max_packet_size: usize,
}

impl FrameDecoder {
    /// Create a decoder that accepts packets up to `max_packet_size` bytes.
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_packet_size.min(DEFAULT_MAX_PACKET_SIZE)),
            state: DecodeState::AwaitFrame,
            max_packet_size,
        }
    }

    /// Current decoder state.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Whether the previous byte was an escape marker.
    pub fn is_escaped(&self) -> bool {
        self.state == DecodeState::Escaped
    }

    /// Drop any partial packet and wait for the next start marker.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = DecodeState::AwaitFrame;
    }

    /// Feed one byte from the stream.
    ///
    /// Returns `Ok(Some(packet))` when the byte completes a packet, `Ok(None)`
    /// when more bytes are needed, and a framing error when the partial packet
    /// had to be discarded.
    pub fn push(&mut self, byte: u8) -> Result<Option<Packet>> {
        if byte == START_OF_FRAME {
            self.buf.clear();
            self.state = DecodeState::Accumulating;
            return Ok(None);
        }

        let byte = match self.state {
            DecodeState::AwaitFrame => return Ok(None),
            DecodeState::Accumulating if byte == ESCAPE => {
                self.state = DecodeState::Escaped;
                return Ok(None);
            }
            DecodeState::Accumulating => byte,
            DecodeState::Escaped => {
                self.state = DecodeState::Accumulating;
                byte.wrapping_add(1)
            }
        };
        self.buf.put_u8(byte);

        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let length = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        if self.buf.len() == HEADER_SIZE && (length < HEADER_SIZE || length > self.max_packet_size)
        {
            self.reset();
            return Err(FrameError::BadLength {
                length,
                min: HEADER_SIZE,
                max: self.max_packet_size,
            });
        }

        if self.buf.len() < length {
            return Ok(None);
        }

        let raw_type = self.buf[2];
        let reserved = self.buf[3];
        let mut frame = self.buf.split();
        self.reset();

        let packet_type = PacketType::try_from(raw_type)?;
        let body = frame.split_off(HEADER_SIZE).freeze();
        Ok(Some(Packet {
            packet_type,
            reserved,
            body,
        }))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

/// Configuration for packet readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum packet size in bytes, header included. Default: 4096.
    pub max_packet_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
