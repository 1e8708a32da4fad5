use serde::{Deserialize, Serialize};

use crate::builder::PROTOCOL_VERSION;
use crate::value::Schema;

/// Name and human-readable metadata shared by every descriptor entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A readable, optionally writeable, device property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    #[serde(flatten)]
    pub field: FieldDefinition,
    pub units: String,
    pub schema: Schema,
    pub required: bool,
    pub writeable: bool,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            field: FieldDefinition::new(name),
            units: String::new(),
            schema,
            required: false,
            writeable: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.field.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.field.description = description.into();
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn writeable(mut self, writeable: bool) -> Self {
        self.writeable = writeable;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Flags byte: bit 0 writeable, bit 1 required.
    pub fn flags(&self) -> u8 {
        u8::from(self.writeable) | (u8::from(self.required) << 1)
    }
}

/// An invocable command with typed request and response payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    #[serde(flatten)]
    pub field: FieldDefinition,
    pub request_schema: Schema,
    pub response_schema: Schema,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, request_schema: Schema, response_schema: Schema) -> Self {
        Self {
            field: FieldDefinition::new(name),
            request_schema,
            response_schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.field.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.field.description = description.into();
        self
    }
}

/// A telemetry event pushed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    #[serde(flatten)]
    pub field: FieldDefinition,
    pub units: String,
    pub schema: Schema,
}

impl EventDefinition {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            field: FieldDefinition::new(name),
            units: String::new(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.field.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.field.description = description.into();
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }
}

/// One interface block: an id plus its entries in registration order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub id: String,
    pub properties: Vec<PropertyDefinition>,
    pub commands: Vec<CommandDefinition>,
    pub events: Vec<EventDefinition>,
}

impl InterfaceDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.field.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.iter().find(|c| c.field.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.field.name == name)
    }
}

/// Root of a peripheral's capability table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub version: u8,
    pub display_name: String,
    pub interfaces: Vec<InterfaceDefinition>,
}

impl DeviceDescriptor {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            display_name: display_name.into(),
            interfaces: Vec::new(),
        }
    }

    /// Interface by wire index (position in the descriptor).
    pub fn interface(&self, index: u8) -> Option<&InterfaceDefinition> {
        self.interfaces.get(index as usize)
    }

    /// Wire index of the interface with `id`.
    pub fn interface_index(&self, id: &str) -> Option<u8> {
        self.interfaces
            .iter()
            .position(|i| i.id == id)
            .and_then(|pos| u8::try_from(pos).ok())
    }

    pub fn property(&self, interface: u8, name: &str) -> Option<&PropertyDefinition> {
        self.interface(interface)?.property(name)
    }

    pub fn command(&self, interface: u8, name: &str) -> Option<&CommandDefinition> {
        self.interface(interface)?.command(name)
    }

    pub fn event(&self, interface: u8, name: &str) -> Option<&EventDefinition> {
        self.interface(interface)?.event(name)
    }
}
