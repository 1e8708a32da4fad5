//! Device descriptor model and codec for SerialPnP.
//!
//! A peripheral describes itself with one binary descriptor: a display name
//! followed by interface blocks, each listing the properties, commands and
//! events it exposes. Every value exchanged afterwards is typed by the
//! [`Schema`] recorded in that descriptor.
//!
//! - [`DescriptorBuilder`] appends entries as they are registered (encode side)
//! - [`decode_descriptor`] parses a received blob in one bounds-checked pass
//! - [`message`] frames the `(interface, name, value)` bodies of property,
//!   command and event packets

pub mod builder;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod message;
pub mod model;
pub mod value;

pub use builder::{encode_descriptor, DescriptorBuilder, PROTOCOL_VERSION};
pub use decode::decode_descriptor;
pub use error::{DescriptorError, Result, ValueError};
pub use message::{NamedValue, ResponseStatus};
pub use model::{
    CommandDefinition, DeviceDescriptor, EventDefinition, FieldDefinition, InterfaceDefinition,
    PropertyDefinition,
};
pub use value::{Schema, Value};
