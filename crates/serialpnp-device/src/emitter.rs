use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serialpnp_descriptor::{EventDefinition, NamedValue, Value};
use serialpnp_frame::{Packet, PacketType, PacketWriter};
use tracing::debug;

use crate::error::{DeviceError, Result};

pub(crate) type SharedWriter<W> = Arc<Mutex<PacketWriter<W>>>;
pub(crate) type EventTable = Arc<HashMap<(u8, String), EventDefinition>>;

/// Cloneable handle for emitting events from any thread.
///
/// Shares the runtime's writer lock, so events never interleave with
/// responses on the link.
pub struct EventEmitter<W> {
    writer: SharedWriter<W>,
    events: EventTable,
}

impl<W> Clone for EventEmitter<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            events: Arc::clone(&self.events),
        }
    }
}

impl<W: Write> EventEmitter<W> {
    pub(crate) fn new(writer: SharedWriter<W>, events: EventTable) -> Self {
        Self { writer, events }
    }

    /// Send an EVENT_NOTIFICATION for a registered event.
    pub fn send(&self, interface: u8, name: &str, value: Value) -> Result<()> {
        let definition = self
            .events
            .get(&(interface, name.to_string()))
            .ok_or_else(|| DeviceError::UnknownEvent {
                interface,
                name: name.to_string(),
            })?;
        value.check_schema(definition.schema)?;

        let body = NamedValue::new(interface, name, &value).encode()?;
        debug!(interface, event = name, %value, "emitting event");
        self.writer
            .lock()
            .write_packet(&Packet::new(PacketType::EventNotification, body))?;
        Ok(())
    }
}
