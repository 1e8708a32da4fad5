//! Handlers registered against descriptor entries.

use std::collections::HashMap;
use std::fmt;

use serialpnp_descriptor::{CommandDefinition, EventDefinition, PropertyDefinition, Value};

use crate::error::{DeviceError, Result};

/// Property handler. Receives the new value on a write (`None` on a read)
/// and returns the property's current value.
pub type PropertyHandler = Box<dyn FnMut(Option<Value>) -> Value + Send>;

/// Command handler. Receives the decoded request and returns the response.
pub type CommandHandler = Box<dyn FnMut(Value) -> Value + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Property,
    Command,
    Event,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Property => "property",
            EntryKind::Command => "command",
            EntryKind::Event => "event",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Handler {
    Property {
        definition: PropertyDefinition,
        handler: PropertyHandler,
    },
    Command {
        definition: CommandDefinition,
        handler: CommandHandler,
    },
    Event {
        definition: EventDefinition,
    },
}

impl Handler {
    fn kind(&self) -> EntryKind {
        match self {
            Handler::Property { .. } => EntryKind::Property,
            Handler::Command { .. } => EntryKind::Command,
            Handler::Event { .. } => EntryKind::Event,
        }
    }
}

type Key = (u8, EntryKind, String);

/// Registered entries keyed by (interface, kind, name).
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Key, Handler>,
}

impl Registry {
    pub fn insert(&mut self, interface: u8, name: &str, handler: Handler) -> Result<()> {
        let key = (interface, handler.kind(), name.to_string());
        if self.entries.contains_key(&key) {
            return Err(DeviceError::Duplicate {
                interface,
                kind: key.1.as_str(),
                name: key.2,
            });
        }
        self.entries.insert(key, handler);
        Ok(())
    }

    pub fn contains(&self, interface: u8, kind: EntryKind, name: &str) -> bool {
        self.entries
            .contains_key(&(interface, kind, name.to_string()))
    }

    pub fn get_mut(&mut self, interface: u8, kind: EntryKind, name: &str) -> Option<&mut Handler> {
        self.entries.get_mut(&(interface, kind, name.to_string()))
    }

    /// Event definitions, split out for [`crate::EventEmitter`].
    pub fn events(&self) -> HashMap<(u8, String), EventDefinition> {
        self.entries
            .iter()
            .filter_map(|((interface, _, name), handler)| match handler {
                Handler::Event { definition } => {
                    Some(((*interface, name.clone()), definition.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
