use tracing::{debug, warn};

use crate::builder::{PROTOCOL_VERSION, TAG_COMMAND, TAG_EVENT, TAG_INTERFACE, TAG_PROPERTY};
use crate::cursor::ByteCursor;
use crate::error::{DescriptorError, Result};
use crate::model::{
    CommandDefinition, DeviceDescriptor, EventDefinition, FieldDefinition, InterfaceDefinition,
    PropertyDefinition,
};
use crate::value::Schema;

/// Parse a descriptor response body into a [`DeviceDescriptor`].
///
/// Every length prefix is checked against the bytes that remain. A nested
/// entry run ends at the first tag that is not a command, property or event;
/// the interface run ends at the end of the buffer.
pub fn decode_descriptor(buf: &[u8]) -> Result<DeviceDescriptor> {
    let mut cur = ByteCursor::new(buf);

    let version = cur.read_u8("version")?;
    if version != PROTOCOL_VERSION {
        warn!(version, expected = PROTOCOL_VERSION, "unexpected descriptor version");
    }
    let display_name = cur.read_str_u8("device name")?;

    let mut interfaces = Vec::new();
    while let Some(tag) = cur.peek_u8() {
        if tag != TAG_INTERFACE {
            return Err(DescriptorError::UnknownTag {
                tag,
                offset: cur.offset(),
            });
        }
        cur.read_u8("tag")?;
        interfaces.push(decode_interface(&mut cur)?);
    }

    debug!(
        device = %display_name,
        interfaces = interfaces.len(),
        "descriptor decoded"
    );

    Ok(DeviceDescriptor {
        version,
        display_name,
        interfaces,
    })
}

fn decode_interface(cur: &mut ByteCursor<'_>) -> Result<InterfaceDefinition> {
    let mut interface = InterfaceDefinition::new(cur.read_str_u16("interface id")?);

    while let Some(tag) = cur.peek_u8() {
        if !matches!(tag, TAG_COMMAND | TAG_PROPERTY | TAG_EVENT) {
            break;
        }
        cur.read_u8("tag")?;
        let field = decode_field(cur)?;
        match tag {
            TAG_COMMAND => {
                let request_schema = read_schema(cur, "request schema")?;
                let response_schema = read_schema(cur, "response schema")?;
                interface.commands.push(CommandDefinition {
                    field,
                    request_schema,
                    response_schema,
                });
            }
            TAG_PROPERTY => {
                let units = cur.read_str_u8("units")?;
                let schema = read_schema(cur, "schema")?;
                let flags = cur.read_u8("flags")?;
                interface.properties.push(PropertyDefinition {
                    field,
                    units,
                    schema,
                    writeable: flags & 0b01 != 0,
                    required: flags & 0b10 != 0,
                });
            }
            _ => {
                let units = cur.read_str_u8("units")?;
                let schema = read_schema(cur, "schema")?;
                interface.events.push(EventDefinition {
                    field,
                    units,
                    schema,
                });
            }
        }
    }

    Ok(interface)
}

fn decode_field(cur: &mut ByteCursor<'_>) -> Result<FieldDefinition> {
    Ok(FieldDefinition {
        name: cur.read_str_u8("name")?,
        display_name: cur.read_str_u8("display name")?,
        description: cur.read_str_u8("description")?,
    })
}

fn read_schema(cur: &mut ByteCursor<'_>, field: &'static str) -> Result<Schema> {
    Schema::try_from(cur.read_u16_le(field)?)
}
