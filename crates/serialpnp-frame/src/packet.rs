use std::fmt;

use bytes::Bytes;

use crate::codec::HEADER_SIZE;
use crate::error::FrameError;

/// Packet type carried in header byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    ResetRequest = 0x01,
    ResetResponse = 0x02,
    DescriptorRequest = 0x03,
    DescriptorResponse = 0x04,
    CommandRequest = 0x05,
    CommandResponse = 0x06,
    PropertyRequest = 0x07,
    PropertyNotification = 0x08,
    EventNotification = 0x0A,
}

impl PacketType {
    /// Wire value of this packet type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::ResetRequest => "reset-request",
            PacketType::ResetResponse => "reset-response",
            PacketType::DescriptorRequest => "descriptor-request",
            PacketType::DescriptorResponse => "descriptor-response",
            PacketType::CommandRequest => "command-request",
            PacketType::CommandResponse => "command-response",
            PacketType::PropertyRequest => "property-request",
            PacketType::PropertyNotification => "property-notification",
            PacketType::EventNotification => "event-notification",
        }
    }

    /// Traffic a peripheral may send without a matching request.
    pub fn is_unsolicited(self) -> bool {
        matches!(
            self,
            PacketType::EventNotification | PacketType::PropertyNotification
        )
    }
}

impl TryFrom<u8> for PacketType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => PacketType::ResetRequest,
            0x02 => PacketType::ResetResponse,
            0x03 => PacketType::DescriptorRequest,
            0x04 => PacketType::DescriptorResponse,
            0x05 => PacketType::CommandRequest,
            0x06 => PacketType::CommandResponse,
            0x07 => PacketType::PropertyRequest,
            0x08 => PacketType::PropertyNotification,
            0x0A => PacketType::EventNotification,
            other => return Err(FrameError::UnknownPacketType(other)),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded SerialPnP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet type (header byte 2).
    pub packet_type: PacketType,
    /// Header byte 3. Zero on requests; response status on replies.
    pub reserved: u8,
    /// Packet body following the 4-byte header.
    pub body: Bytes,
}

impl Packet {
    /// Create a packet with a zero reserved byte.
    pub fn new(packet_type: PacketType, body: impl Into<Bytes>) -> Self {
        Self {
            packet_type,
            reserved: 0,
            body: body.into(),
        }
    }

    /// Create a body-less packet (reset and descriptor requests).
    pub fn empty(packet_type: PacketType) -> Self {
        Self::new(packet_type, Bytes::new())
    }

    /// Set the reserved header byte.
    pub fn with_reserved(mut self, reserved: u8) -> Self {
        self.reserved = reserved;
        self
    }

    /// Value of the header length field: header plus body, before escaping.
    pub fn length(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}
