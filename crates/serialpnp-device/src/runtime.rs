use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serialpnp_descriptor::{NamedValue, ResponseStatus, Schema, Value};
use serialpnp_frame::{FrameError, FrameStats, Packet, PacketReader, PacketType, PacketWriter};
use tracing::{debug, info, warn};

use crate::emitter::{EventEmitter, EventTable, SharedWriter};
use crate::error::{DeviceError, Result};
use crate::registry::{EntryKind, Handler, Registry};

pub(crate) type ResetHook = Box<dyn FnMut() + Send>;

/// A ready peripheral: answers host requests and emits events.
///
/// The thread calling [`Runtime::run`] (or [`Runtime::process_next`]) owns
/// all reads. Writes go through a mutex shared with every [`EventEmitter`].
pub struct Runtime<R, W> {
    reader: PacketReader<R>,
    writer: SharedWriter<W>,
    descriptor: Bytes,
    registry: Registry,
    events: EventTable,
    reset_hook: Option<ResetHook>,
}

impl<R: Read, W: Write> Runtime<R, W> {
    pub(crate) fn start(
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
        descriptor: Bytes,
        registry: Registry,
        reset_hook: Option<ResetHook>,
        announce: bool,
    ) -> Result<Self> {
        let events = Arc::new(registry.events());
        let runtime = Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            descriptor,
            registry,
            events,
            reset_hook,
        };

        info!(
            descriptor_len = runtime.descriptor.len(),
            entries = runtime.registry.len(),
            "device runtime ready"
        );
        if announce {
            runtime.send(Packet::empty(PacketType::ResetResponse))?;
        }
        Ok(runtime)
    }

    /// The encoded descriptor served on DESCRIPTOR_REQUEST.
    pub fn descriptor_bytes(&self) -> &Bytes {
        &self.descriptor
    }

    /// Handle for emitting events from other threads.
    pub fn emitter(&self) -> EventEmitter<W> {
        EventEmitter::new(Arc::clone(&self.writer), Arc::clone(&self.events))
    }

    /// Emit an event registered with [`crate::RuntimeBuilder::new_event`].
    pub fn send_event(&self, interface: u8, name: &str, value: Value) -> Result<()> {
        self.emitter().send(interface, name, value)
    }

    pub fn stats(&self) -> FrameStats {
        self.reader.stats()
    }

    /// Read and answer one packet.
    pub fn process_next(&mut self) -> Result<()> {
        let packet = self.reader.read_packet()?;
        self.handle(packet)
    }

    /// Serve requests until the host closes the link.
    ///
    /// Read timeouts are ignored; any other transport or framing failure is
    /// returned.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.process_next() {
                Ok(()) => {}
                Err(DeviceError::Frame(err)) if err.is_timeout() => continue,
                Err(DeviceError::Frame(FrameError::ConnectionClosed)) => {
                    info!("host closed the link");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn handle(&mut self, packet: Packet) -> Result<()> {
        match packet.packet_type {
            PacketType::ResetRequest => {
                info!("reset requested");
                if let Some(hook) = self.reset_hook.as_mut() {
                    hook();
                }
                self.send(Packet::empty(PacketType::ResetResponse))
            }
            PacketType::DescriptorRequest => {
                debug!(len = self.descriptor.len(), "sending descriptor");
                self.send(Packet::new(
                    PacketType::DescriptorResponse,
                    self.descriptor.clone(),
                ))
            }
            PacketType::PropertyRequest => self.handle_property(&packet),
            PacketType::CommandRequest => self.handle_command(&packet),
            other => {
                debug!(packet_type = %other, "ignoring packet");
                Ok(())
            }
        }
    }

    /// An empty payload is a read; anything else is a write.
    fn handle_property(&mut self, packet: &Packet) -> Result<()> {
        let Some(request) = decode_request(packet) else {
            return Ok(());
        };

        let (status, value) =
            match self
                .registry
                .get_mut(request.interface, EntryKind::Property, &request.name)
            {
                Some(Handler::Property {
                    definition,
                    handler,
                }) => {
                    if !request.payload.is_empty() && !definition.writeable {
                        warn!(property = %request.name, "write to read-only property");
                        (ResponseStatus::ReadOnly, None)
                    } else {
                        let update = if request.payload.is_empty() {
                            Ok(None)
                        } else {
                            request.value(definition.schema).map(Some)
                        };
                        match update {
                            Ok(update) => {
                                debug!(property = %request.name, write = update.is_some(), "property request");
                                let current = handler(update);
                                checked(current, definition.schema, &request.name)
                            }
                            Err(err) => {
                                warn!(property = %request.name, error = %err, "invalid property payload");
                                (ResponseStatus::InvalidPayload, None)
                            }
                        }
                    }
                }
                _ => {
                    warn!(interface = request.interface, property = %request.name, "unknown property");
                    (ResponseStatus::NotFound, None)
                }
            };

        self.reply(PacketType::PropertyNotification, status, &request, value)
    }

    /// Run a command handler and answer with COMMAND_RESPONSE.
    ///
    /// A body that does not decode (under two bytes, a name running past the
    /// end, or a name that is not UTF-8) carries no usable name to echo, so it
    /// is logged and dropped without a reply. The host's command timeout
    /// covers that case.
    fn handle_command(&mut self, packet: &Packet) -> Result<()> {
        let Some(request) = decode_request(packet) else {
            return Ok(());
        };

        let (status, value) =
            match self
                .registry
                .get_mut(request.interface, EntryKind::Command, &request.name)
            {
                Some(Handler::Command {
                    definition,
                    handler,
                }) => match request.value(definition.request_schema) {
                    Ok(input) => {
                        debug!(command = %request.name, %input, "invoking command");
                        let output = handler(input);
                        checked(output, definition.response_schema, &request.name)
                    }
                    Err(err) => {
                        warn!(command = %request.name, error = %err, "invalid command payload");
                        (ResponseStatus::InvalidPayload, None)
                    }
                },
                _ => {
                    warn!(interface = request.interface, command = %request.name, "unknown command");
                    (ResponseStatus::NotFound, None)
                }
            };

        self.reply(PacketType::CommandResponse, status, &request, value)
    }

    fn reply(
        &self,
        packet_type: PacketType,
        status: ResponseStatus,
        request: &NamedValue,
        value: Option<Value>,
    ) -> Result<()> {
        let message = match &value {
            Some(value) => NamedValue::new(request.interface, request.name.clone(), value),
            None => NamedValue::empty(request.interface, request.name.clone()),
        };
        let packet = Packet::new(packet_type, message.encode()?).with_reserved(status.as_u8());
        self.send(packet)
    }

    fn send(&self, packet: Packet) -> Result<()> {
        self.writer.lock().write_packet(&packet)?;
        Ok(())
    }
}

/// Handler output must match the declared schema.
fn checked(value: Value, schema: Schema, name: &str) -> (ResponseStatus, Option<Value>) {
    match value.check_schema(schema) {
        Ok(()) => (ResponseStatus::Ok, Some(value)),
        Err(err) => {
            warn!(entry = name, error = %err, "handler returned a value of the wrong schema");
            (ResponseStatus::HandlerFault, None)
        }
    }
}

fn decode_request(packet: &Packet) -> Option<NamedValue> {
    match NamedValue::decode(&packet.body) {
        Ok(request) => Some(request),
        Err(err) => {
            warn!(packet_type = %packet.packet_type, error = %err, "malformed request dropped");
            None
        }
    }
}
