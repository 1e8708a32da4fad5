use bytes::{BufMut, Bytes, BytesMut};
use serialpnp_frame::{DEFAULT_MAX_PACKET_SIZE, HEADER_SIZE};
use tracing::debug;

use crate::error::{DescriptorError, Result};
use crate::model::{
    CommandDefinition, DeviceDescriptor, EventDefinition, FieldDefinition, PropertyDefinition,
};

/// Descriptor format version written by this crate.
pub const PROTOCOL_VERSION: u8 = 0x01;

pub const TAG_COMMAND: u8 = 0x01;
pub const TAG_PROPERTY: u8 = 0x02;
pub const TAG_EVENT: u8 = 0x03;
pub const TAG_INTERFACE: u8 = 0x05;

/// Incremental descriptor encoder.
///
/// Each registration appends one pre-serialized entry. The encoded descriptor
/// must fit one descriptor response packet, so every append is checked
/// against `max_len` (default: maximum packet size minus the packet header).
///
/// Wire layout:
/// ```text
/// Descriptor     := Version:u8 NameLen:u8 Name InterfaceBlock*
/// InterfaceBlock := 0x05 IdLen:u16le Id FieldEntry*
/// FieldEntry     := Tag:u8 NameLen:u8 Name DisplayLen:u8 Display DescLen:u8 Desc ...
///   0x01 command:  RequestSchema:u16le ResponseSchema:u16le
///   0x02 property: UnitLen:u8 Unit Schema:u16le Flags:u8
///   0x03 event:    UnitLen:u8 Unit Schema:u16le
/// ```
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    version: u8,
    display_name: String,
    entries: Vec<Bytes>,
    encoded_len: usize,
    max_len: usize,
    interfaces: usize,
}

impl DescriptorBuilder {
    /// Start a descriptor for a device called `display_name`.
    pub fn new(display_name: impl Into<String>) -> Result<Self> {
        let display_name = display_name.into();
        check_len("device name", display_name.len(), u8::MAX as usize)?;
        Ok(Self {
            version: PROTOCOL_VERSION,
            encoded_len: 2 + display_name.len(),
            display_name,
            entries: Vec::new(),
            max_len: DEFAULT_MAX_PACKET_SIZE - HEADER_SIZE,
            interfaces: 0,
        })
    }

    /// Override the size cap (for links configured with a larger packet size).
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Append an interface block. Returns its wire index.
    pub fn add_interface(&mut self, id: &str) -> Result<u8> {
        let index = u8::try_from(self.interfaces).map_err(|_| {
            DescriptorError::TooManyInterfaces {
                max: u8::MAX as usize + 1,
            }
        })?;
        check_len("interface id", id.len(), u16::MAX as usize)?;

        let mut entry = BytesMut::with_capacity(3 + id.len());
        entry.put_u8(TAG_INTERFACE);
        entry.put_u16_le(id.len() as u16);
        entry.put_slice(id.as_bytes());
        self.push(entry)?;

        self.interfaces += 1;
        debug!(interface = id, index, "descriptor interface added");
        Ok(index)
    }

    /// Append a property entry to the current interface.
    pub fn add_property(&mut self, def: &PropertyDefinition) -> Result<()> {
        self.require_interface("property")?;
        let mut entry = BytesMut::new();
        put_field(&mut entry, TAG_PROPERTY, &def.field)?;
        put_str_u8(&mut entry, &def.units, "units")?;
        entry.put_u16_le(def.schema.code());
        entry.put_u8(def.flags());
        self.push(entry)
    }

    /// Append a command entry to the current interface.
    pub fn add_command(&mut self, def: &CommandDefinition) -> Result<()> {
        self.require_interface("command")?;
        let mut entry = BytesMut::new();
        put_field(&mut entry, TAG_COMMAND, &def.field)?;
        entry.put_u16_le(def.request_schema.code());
        entry.put_u16_le(def.response_schema.code());
        self.push(entry)
    }

    /// Append an event entry to the current interface.
    pub fn add_event(&mut self, def: &EventDefinition) -> Result<()> {
        self.require_interface("event")?;
        let mut entry = BytesMut::new();
        put_field(&mut entry, TAG_EVENT, &def.field)?;
        put_str_u8(&mut entry, &def.units, "units")?;
        entry.put_u16_le(def.schema.code());
        self.push(entry)
    }

    /// Number of interface blocks appended so far.
    pub fn interface_count(&self) -> usize {
        self.interfaces
    }

    /// Size of the descriptor as [`DescriptorBuilder::build`] would emit it.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Concatenate the header and all entries.
    pub fn build(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.encoded_len);
        out.put_u8(self.version);
        out.put_u8(self.display_name.len() as u8);
        out.put_slice(self.display_name.as_bytes());
        for entry in &self.entries {
            out.put_slice(entry);
        }
        out.freeze()
    }

    fn require_interface(&self, kind: &'static str) -> Result<()> {
        if self.interfaces == 0 {
            Err(DescriptorError::NoInterface(kind))
        } else {
            Ok(())
        }
    }

    fn push(&mut self, entry: BytesMut) -> Result<()> {
        let size = self.encoded_len + entry.len();
        if size > self.max_len {
            return Err(DescriptorError::TooLarge {
                size,
                max: self.max_len,
            });
        }
        self.encoded_len = size;
        self.entries.push(entry.freeze());
        Ok(())
    }
}

/// Encode a complete descriptor model.
///
/// Entries of each interface are written properties first, then commands,
/// then events.
pub fn encode_descriptor(descriptor: &DeviceDescriptor) -> Result<Bytes> {
    let mut builder = DescriptorBuilder::new(descriptor.display_name.as_str())?;
    builder.version = descriptor.version;
    for interface in &descriptor.interfaces {
        builder.add_interface(&interface.id)?;
        for property in &interface.properties {
            builder.add_property(property)?;
        }
        for command in &interface.commands {
            builder.add_command(command)?;
        }
        for event in &interface.events {
            builder.add_event(event)?;
        }
    }
    Ok(builder.build())
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        Err(DescriptorError::FieldTooLong { field, len, max })
    } else {
        Ok(())
    }
}

fn put_str_u8(dst: &mut BytesMut, value: &str, field: &'static str) -> Result<()> {
    check_len(field, value.len(), u8::MAX as usize)?;
    dst.put_u8(value.len() as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn put_field(dst: &mut BytesMut, tag: u8, field: &FieldDefinition) -> Result<()> {
    dst.put_u8(tag);
    put_str_u8(dst, &field.name, "name")?;
    put_str_u8(dst, &field.display_name, "display name")?;
    put_str_u8(dst, &field.description, "description")
}
