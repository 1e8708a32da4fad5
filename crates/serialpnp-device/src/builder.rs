use std::io::{Read, Write};

use serialpnp_descriptor::{
    CommandDefinition, DescriptorBuilder, DescriptorError, EventDefinition, PropertyDefinition,
    Value,
};
use serialpnp_frame::{PacketReader, PacketWriter, HEADER_SIZE};
use serialpnp_transport::LinkStream;

use crate::config::RuntimeConfig;
use crate::error::{DeviceError, Result};
use crate::registry::{EntryKind, Handler, Registry};
use crate::runtime::{ResetHook, Runtime};

/// Registration phase of a peripheral.
///
/// Entries are appended to the current interface (the one most recently
/// added with [`RuntimeBuilder::new_interface`]) and encoded into the
/// descriptor as they are registered.
///
/// ```no_run
/// use serialpnp_descriptor::{EventDefinition, PropertyDefinition, Schema, Value};
/// use serialpnp_device::RuntimeBuilder;
///
/// # fn main() -> serialpnp_device::Result<()> {
/// let mut builder = RuntimeBuilder::new("Thermo")?;
/// builder.new_interface("thermo")?;
/// let mut rate = 1000.0;
/// builder.new_property(
///     PropertyDefinition::new("sample_rate", Schema::Float).units("ms").writeable(true),
///     move |update| {
///         if let Some(Value::Float(v)) = update {
///             rate = v;
///         }
///         Value::Float(rate)
///     },
/// )?;
/// builder.new_event(EventDefinition::new("temperature", Schema::Float))?;
/// # Ok(())
/// # }
/// ```
pub struct RuntimeBuilder {
    descriptor: DescriptorBuilder,
    registry: Registry,
    reset_hook: Option<ResetHook>,
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new(display_name: impl Into<String>) -> Result<Self> {
        Self::with_config(display_name, RuntimeConfig::default())
    }

    pub fn with_config(display_name: impl Into<String>, config: RuntimeConfig) -> Result<Self> {
        let max_len = config.frame.max_packet_size.saturating_sub(HEADER_SIZE);
        let descriptor = DescriptorBuilder::new(display_name)?.with_max_len(max_len);
        Ok(Self {
            descriptor,
            registry: Registry::default(),
            reset_hook: None,
            config,
        })
    }

    /// Start a new interface. Later entries belong to it. Returns its index.
    pub fn new_interface(&mut self, id: &str) -> Result<u8> {
        Ok(self.descriptor.add_interface(id)?)
    }

    /// Register a property and the handler that reads and writes it.
    pub fn new_property<F>(&mut self, definition: PropertyDefinition, handler: F) -> Result<()>
    where
        F: FnMut(Option<Value>) -> Value + Send + 'static,
    {
        let interface = self.claim(EntryKind::Property, definition.name())?;
        self.descriptor.add_property(&definition)?;
        let name = definition.name().to_string();
        self.registry.insert(
            interface,
            &name,
            Handler::Property {
                definition,
                handler: Box::new(handler),
            },
        )
    }

    /// Register a command and its handler.
    pub fn new_command<F>(&mut self, definition: CommandDefinition, handler: F) -> Result<()>
    where
        F: FnMut(Value) -> Value + Send + 'static,
    {
        let interface = self.claim(EntryKind::Command, definition.name())?;
        self.descriptor.add_command(&definition)?;
        let name = definition.name().to_string();
        self.registry.insert(
            interface,
            &name,
            Handler::Command {
                definition,
                handler: Box::new(handler),
            },
        )
    }

    /// Register an event the peripheral may emit.
    pub fn new_event(&mut self, definition: EventDefinition) -> Result<()> {
        let interface = self.claim(EntryKind::Event, definition.name())?;
        self.descriptor.add_event(&definition)?;
        let name = definition.name().to_string();
        self.registry
            .insert(interface, &name, Handler::Event { definition })
    }

    /// Hook run on every RESET_REQUEST, before the response is sent.
    pub fn on_reset<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.reset_hook = Some(Box::new(hook));
    }

    /// Current encoded descriptor size.
    pub fn descriptor_len(&self) -> usize {
        self.descriptor.encoded_len()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Freeze the descriptor and start serving on `reader`/`writer`.
    pub fn ready<R: Read, W: Write>(self, reader: R, writer: W) -> Result<Runtime<R, W>> {
        let reader = PacketReader::with_config(reader, self.config.frame.clone());
        let writer = PacketWriter::with_config(writer, self.config.frame.clone());
        self.start(reader, writer)
    }

    /// [`RuntimeBuilder::ready`] over a connected link, applying the
    /// configured timeouts.
    pub fn ready_link(self, stream: LinkStream) -> Result<Runtime<LinkStream, LinkStream>> {
        let reader =
            PacketReader::with_config_link(stream.try_clone()?, self.config.frame.clone())?;
        let writer = PacketWriter::with_config_link(stream, self.config.frame.clone())?;
        self.start(reader, writer)
    }

    fn start<R: Read, W: Write>(
        self,
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
    ) -> Result<Runtime<R, W>> {
        let descriptor = self.descriptor.build();
        Runtime::start(
            reader,
            writer,
            descriptor,
            self.registry,
            self.reset_hook,
            self.config.announce_ready,
        )
    }

    /// Index of the current interface, after checking `name` is free on it.
    fn claim(&self, kind: EntryKind, name: &str) -> Result<u8> {
        let count = self.descriptor.interface_count();
        if count == 0 {
            return Err(DescriptorError::NoInterface(kind.as_str()).into());
        }
        let interface = (count - 1) as u8;
        if self.registry.contains(interface, kind, name) {
            return Err(DeviceError::Duplicate {
                interface,
                kind: kind.as_str(),
                name: name.to_string(),
            });
        }
        Ok(interface)
    }
}
