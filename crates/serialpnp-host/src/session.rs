use std::fmt;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serialpnp_descriptor::{
    CommandDefinition, DeviceDescriptor, NamedValue, PropertyDefinition, ResponseStatus, Value,
};
use serialpnp_frame::{FrameError, Packet, PacketReader, PacketType, PacketWriter};
use serialpnp_transport::LinkStream;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::correlation::{CommandSlot, Delivery};
use crate::discovery;
use crate::error::{HostError, Result};
use crate::notification::{Notification, Subscribers};

/// Lifecycle of a host session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Resetting,
    AwaitingDescriptor,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Resetting => "resetting",
            SessionState::AwaitingDescriptor => "awaiting-descriptor",
            SessionState::Ready => "ready",
        })
    }
}

/// Response to a command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub interface: u8,
    pub name: String,
    pub value: Value,
}

type ReadResult = std::result::Result<Value, ResponseStatus>;

struct PendingRead {
    id: u64,
    interface: u8,
    name: String,
    tx: mpsc::Sender<ReadResult>,
}

/// State shared between callers and the receive thread.
struct Shared {
    descriptor: Arc<DeviceDescriptor>,
    state: Mutex<SessionState>,
    stop: AtomicBool,
    commands: CommandSlot,
    events: Subscribers,
    properties: Subscribers,
    pending_reads: Mutex<Vec<PendingRead>>,
    next_read_id: AtomicU64,
}

/// A connected, discovered SerialPnP device.
///
/// Created by [`HostSession::establish`] (any `Read`/`Write` pair) or
/// [`crate::connect`] (an endpoint). A dedicated receive thread dispatches
/// events, property notifications and command responses until the link
/// fails or the session is closed.
pub struct HostSession {
    shared: Arc<Shared>,
    writer: Mutex<PacketWriter<Box<dyn Write + Send>>>,
    command_lock: Mutex<()>,
    receiver: Option<JoinHandle<()>>,
    link: Option<LinkStream>,
    config: SessionConfig,
}

impl HostSession {
    /// Reset the device, fetch its descriptor and start the receive thread.
    ///
    /// `reader` should have a read timeout (for example
    /// [`SessionConfig::poll_interval`]); discovery deadlines and shutdown
    /// both rely on reads returning periodically.
    pub fn establish<R, W>(reader: R, writer: W, config: SessionConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let mut reader = PacketReader::with_config(reader, config.frame.clone());
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let mut writer = PacketWriter::with_config(boxed, config.frame.clone());

        info!(state = %SessionState::Resetting, "resetting device");
        discovery::reset_device(&mut reader, &mut writer, &config)?;

        info!(state = %SessionState::AwaitingDescriptor, "requesting descriptor");
        let descriptor = discovery::fetch_descriptor(&mut reader, &mut writer, &config)?;
        info!(
            state = %SessionState::Ready,
            device = %descriptor.display_name,
            interfaces = descriptor.interfaces.len(),
            "device ready"
        );

        let shared = Arc::new(Shared {
            descriptor: Arc::new(descriptor),
            state: Mutex::new(SessionState::Ready),
            stop: AtomicBool::new(false),
            commands: CommandSlot::default(),
            events: Subscribers::default(),
            properties: Subscribers::default(),
            pending_reads: Mutex::new(Vec::new()),
            next_read_id: AtomicU64::new(1),
        });

        let loop_shared = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name("serialpnp-host-rx".to_string())
            .spawn(move || receive_loop(reader, loop_shared))
            .map_err(|e| HostError::Transport(e.into()))?;

        Ok(Self {
            shared,
            writer: Mutex::new(writer),
            command_lock: Mutex::new(()),
            receiver: Some(receiver),
            link: None,
            config,
        })
    }

    /// Establish a session over a connected link, applying timeouts from `config`.
    pub fn establish_link(stream: LinkStream, config: SessionConfig) -> Result<Self> {
        stream.set_read_timeout(Some(config.poll_interval))?;
        stream.set_write_timeout(Some(config.response_timeout))?;
        let reader = stream.try_clone()?;
        let closer = stream.try_clone()?;

        let mut session = Self::establish(reader, stream, config)?;
        session.link = Some(closer);
        Ok(session)
    }

    /// The decoded capability table.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.shared.descriptor
    }

    /// Shared handle to the capability table.
    pub fn descriptor_arc(&self) -> Arc<DeviceDescriptor> {
        Arc::clone(&self.shared.descriptor)
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wire index of the interface with `id`.
    pub fn interface_index(&self, id: &str) -> Result<u8> {
        self.shared
            .descriptor
            .interface_index(id)
            .ok_or_else(|| HostError::UnknownInterfaceId(id.to_string()))
    }

    /// Send a property write. Fire-and-forget: the device answers with a
    /// property notification carrying the resulting value.
    pub fn write_property(&self, interface: u8, name: &str, value: Value) -> Result<()> {
        let property = self.property(interface, name)?;
        if !property.writeable {
            return Err(HostError::ReadOnly(name.to_string()));
        }
        value.check_schema(property.schema)?;

        debug!(interface, property = name, %value, "writing property");
        self.send(
            PacketType::PropertyRequest,
            &NamedValue::new(interface, name, &value),
        )
    }

    /// Parse `text` with the property's schema and write it.
    pub fn write_property_str(&self, interface: u8, name: &str, text: &str) -> Result<()> {
        let schema = self.property(interface, name)?.schema;
        self.write_property(interface, name, Value::parse(schema, text)?)
    }

    /// Ask the device to report a property's current value.
    ///
    /// The answer arrives through the property-notification subscribers.
    pub fn request_property(&self, interface: u8, name: &str) -> Result<()> {
        self.property(interface, name)?;
        debug!(interface, property = name, "requesting property");
        self.send(PacketType::PropertyRequest, &NamedValue::empty(interface, name))
    }

    /// Request a property and wait for the notification that answers it.
    pub fn read_property(&self, interface: u8, name: &str, timeout: Duration) -> Result<Value> {
        self.property(interface, name)?;
        self.await_property(interface, name, timeout, || {
            self.request_property(interface, name)
        })
    }

    /// Write a property and wait for the notification reporting the value the
    /// device settled on. Rejections by the device surface as
    /// [`HostError::Remote`].
    pub fn write_property_confirmed(
        &self,
        interface: u8,
        name: &str,
        value: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.await_property(interface, name, timeout, || {
            self.write_property(interface, name, value)
        })
    }

    /// Register for the next notification of `name`, run `send`, then wait.
    fn await_property<F>(&self, interface: u8, name: &str, timeout: Duration, send: F) -> Result<Value>
    where
        F: FnOnce() -> Result<()>,
    {
        let id = self.shared.next_read_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.shared.pending_reads.lock().push(PendingRead {
            id,
            interface,
            name: name.to_string(),
            tx,
        });

        if let Err(err) = send() {
            self.shared.remove_pending_read(id);
            return Err(err);
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(status)) => Err(HostError::Remote {
                name: name.to_string(),
                status,
            }),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.shared.remove_pending_read(id);
                Err(HostError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(HostError::Disconnected(
                "link closed while waiting for property".to_string(),
            )),
        }
    }

    /// Invoke a command and block for its response.
    ///
    /// Commands are serialized session-wide; a caller waits for any command
    /// already in flight. A timeout is reported and never retried.
    pub fn invoke_command(
        &self,
        interface: u8,
        name: &str,
        request: Value,
    ) -> Result<CommandResponse> {
        let command = self.command(interface, name)?;
        let response_schema = command.response_schema;
        request.check_schema(command.request_schema)?;
        let body = NamedValue::new(interface, name, &request).encode()?;

        let _exclusive = self.command_lock.lock();
        self.ensure_ready()?;
        self.shared.commands.arm(interface, name)?;

        debug!(interface, command = name, %request, "invoking command");
        let sent = self
            .writer
            .lock()
            .write_packet(&Packet::new(PacketType::CommandRequest, body));
        if let Err(err) = sent {
            self.shared.commands.disarm();
            return Err(err.into());
        }

        let completion = match self.shared.commands.wait(self.config.command_timeout) {
            Ok(completion) => completion,
            Err(err) => {
                warn!(interface, command = name, error = %err, "command failed");
                return Err(err);
            }
        };

        let status = response_status(completion.status);
        if !status.is_ok() {
            return Err(HostError::Remote {
                name: name.to_string(),
                status,
            });
        }

        let value = completion.message.value(response_schema)?;
        Ok(CommandResponse {
            interface,
            name: name.to_string(),
            value,
        })
    }

    /// Parse `text` with the command's request schema and invoke it.
    pub fn invoke_command_str(
        &self,
        interface: u8,
        name: &str,
        text: &str,
    ) -> Result<CommandResponse> {
        let schema = self.command(interface, name)?.request_schema;
        self.invoke_command(interface, name, Value::parse(schema, text)?)
    }

    /// Register a callback for every event notification.
    ///
    /// Callbacks run on the receive thread and must not block on the session.
    /// A callback may drop the last handle to the session; the receive thread
    /// then winds down on its own.
    pub fn subscribe_events<F>(&self, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.shared.events.add(Arc::new(callback));
    }

    /// Register a callback for every property notification.
    pub fn subscribe_property_notifications<F>(&self, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.shared.properties.add(Arc::new(callback));
    }

    /// Stop the receive thread and release the link.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(link) = self.link.take() {
            if let Err(err) = link.shutdown() {
                debug!(error = %err, "link shutdown failed");
            }
        }
        if let Some(handle) = self.receiver.take() {
            if handle.thread().id() == thread::current().id() {
                // Dropped from a subscriber callback; the loop exits on `stop`.
                debug!("session closed on its receive thread; not joining");
            } else if handle.join().is_err() {
                error!("receive thread panicked");
            }
        }
        self.shared.mark_disconnected("session closed");
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            SessionState::Ready => Ok(()),
            other => Err(HostError::Disconnected(format!("session is {other}"))),
        }
    }

    fn property(&self, interface: u8, name: &str) -> Result<&PropertyDefinition> {
        let iface = self
            .shared
            .descriptor
            .interface(interface)
            .ok_or(HostError::UnknownInterface(interface))?;
        iface
            .property(name)
            .ok_or_else(|| HostError::UnknownProperty {
                interface,
                name: name.to_string(),
            })
    }

    fn command(&self, interface: u8, name: &str) -> Result<&CommandDefinition> {
        let iface = self
            .shared
            .descriptor
            .interface(interface)
            .ok_or(HostError::UnknownInterface(interface))?;
        iface.command(name).ok_or_else(|| HostError::UnknownCommand {
            interface,
            name: name.to_string(),
        })
    }

    fn send(&self, packet_type: PacketType, message: &NamedValue) -> Result<()> {
        self.ensure_ready()?;
        let body = message.encode()?;
        self.writer
            .lock()
            .write_packet(&Packet::new(packet_type, body))?;
        Ok(())
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for HostSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSession")
            .field("device", &self.shared.descriptor.display_name)
            .field("state", &self.state())
            .finish()
    }
}

fn response_status(code: u8) -> ResponseStatus {
    ResponseStatus::from_u8(code).unwrap_or_else(|| {
        warn!(code, "unknown response status");
        ResponseStatus::HandlerFault
    })
}

impl Shared {
    fn mark_disconnected(&self, reason: &str) {
        *self.state.lock() = SessionState::Disconnected;
        self.commands.disconnect(reason);
        // Dropping the senders wakes every pending read.
        self.pending_reads.lock().clear();
    }

    fn remove_pending_read(&self, id: u64) {
        self.pending_reads.lock().retain(|read| read.id != id);
    }

    fn dispatch(&self, packet: Packet) {
        match packet.packet_type {
            PacketType::EventNotification => self.dispatch_event(&packet),
            PacketType::PropertyNotification => self.dispatch_property(&packet),
            PacketType::CommandResponse => self.dispatch_command_response(&packet),
            PacketType::ResetResponse => info!("device reported a reset"),
            other => debug!(packet_type = %other, "ignoring packet"),
        }
    }

    fn dispatch_event(&self, packet: &Packet) {
        let Some(message) = decode_body(packet) else {
            return;
        };
        let Some(iface) = self.descriptor.interface(message.interface) else {
            warn!(interface = message.interface, "event for unknown interface dropped");
            return;
        };
        let Some(event) = iface.event(&message.name) else {
            warn!(interface = %iface.id, event = %message.name, "unknown event dropped");
            return;
        };
        let value = match message.value(event.schema) {
            Ok(value) => value,
            Err(err) => {
                warn!(event = %message.name, error = %err, "undecodable event dropped");
                return;
            }
        };

        let notification = Notification {
            interface: message.interface,
            interface_id: iface.id.clone(),
            name: message.name,
            value,
        };
        let delivered = self.events.notify(&notification);
        debug!(event = %notification.name, subscribers = delivered, "event dispatched");
    }

    fn dispatch_property(&self, packet: &Packet) {
        let Some(message) = decode_body(packet) else {
            return;
        };
        let Some(iface) = self.descriptor.interface(message.interface) else {
            warn!(interface = message.interface, "property for unknown interface dropped");
            return;
        };
        let Some(property) = iface.property(&message.name) else {
            warn!(interface = %iface.id, property = %message.name, "unknown property dropped");
            return;
        };

        let result = match response_status(packet.reserved) {
            ResponseStatus::Ok => match message.value(property.schema) {
                Ok(value) => Ok(value),
                Err(err) => {
                    warn!(property = %message.name, error = %err, "undecodable property dropped");
                    return;
                }
            },
            status => {
                warn!(property = %message.name, %status, "device rejected property request");
                Err(status)
            }
        };

        self.pending_reads.lock().retain(|read| {
            if read.interface == message.interface && read.name == message.name {
                let _ = read.tx.send(result.clone());
                false
            } else {
                true
            }
        });

        if let Ok(value) = result {
            let notification = Notification {
                interface: message.interface,
                interface_id: iface.id.clone(),
                name: message.name,
                value,
            };
            self.properties.notify(&notification);
        }
    }

    fn dispatch_command_response(&self, packet: &Packet) {
        let Some(message) = decode_body(packet) else {
            return;
        };
        if self.descriptor.command(message.interface, &message.name).is_none() {
            warn!(
                interface = message.interface,
                command = %message.name,
                "response for unknown command dropped"
            );
            return;
        }

        let name = message.name.clone();
        match self.commands.deliver(packet.reserved, message) {
            Delivery::Delivered => debug!(command = %name, "command response delivered"),
            Delivery::NoWaiter => warn!(command = %name, "command response with no waiter dropped"),
            Delivery::Mismatch => {
                warn!(command = %name, "response for a different command dropped")
            }
        }
    }
}

fn decode_body(packet: &Packet) -> Option<NamedValue> {
    match NamedValue::decode(&packet.body) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(packet_type = %packet.packet_type, error = %err, "malformed packet body dropped");
            None
        }
    }
}

fn receive_loop<R: Read>(mut reader: PacketReader<R>, shared: Arc<Shared>) {
    let reason = loop {
        if shared.stop.load(Ordering::Acquire) {
            break "session closed".to_string();
        }
        match reader.read_packet() {
            Ok(packet) => shared.dispatch(packet),
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                if !shared.stop.load(Ordering::Acquire) {
                    info!("device closed the link");
                }
                break "link closed".to_string();
            }
            Err(err) => {
                if !shared.stop.load(Ordering::Acquire) {
                    error!(error = %err, "receive loop failed");
                }
                break err.to_string();
            }
        }
    };

    let stats = reader.stats();
    debug!(
        packets = stats.packets,
        framing_errors = stats.framing_errors,
        filtered = stats.filtered,
        "receive loop stopped"
    );
    shared.mark_disconnected(&reason);
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serialpnp_descriptor::{
        encode_descriptor, CommandDefinition, EventDefinition, InterfaceDefinition, Schema,
    };
    use serialpnp_frame::FrameConfig;

    use super::*;

    struct FakeDevice {
        reader: PacketReader<LinkStream>,
        writer: PacketWriter<LinkStream>,
    }

    impl FakeDevice {
        fn new(stream: LinkStream) -> Self {
            let config = FrameConfig::default();
            Self {
                reader: PacketReader::with_config(stream.try_clone().unwrap(), config.clone()),
                writer: PacketWriter::with_config(stream, config),
            }
        }

        fn expect(&mut self, packet_type: PacketType) -> Packet {
            let packet = self.reader.read_packet().unwrap();
            assert_eq!(packet.packet_type, packet_type);
            packet
        }

        fn reply(&mut self, packet_type: PacketType, status: u8, message: NamedValue) {
            self.writer
                .write_packet(
                    &Packet::new(packet_type, message.encode().unwrap()).with_reserved(status),
                )
                .unwrap();
        }
    }

    fn test_descriptor() -> DeviceDescriptor {
        let mut thermo = InterfaceDefinition::new("thermo");
        thermo.properties.push(
            PropertyDefinition::new("sample_rate", Schema::Float)
                .units("ms")
                .writeable(true),
        );
        thermo
            .properties
            .push(PropertyDefinition::new("serial", Schema::String));
        thermo
            .commands
            .push(CommandDefinition::new("add_one", Schema::Int, Schema::Int));
        thermo
            .events
            .push(EventDefinition::new("temperature", Schema::Float));
        let mut device = DeviceDescriptor::new("Thermo");
        device.interfaces.push(thermo);
        device
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            response_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_millis(10),
            command_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn start(config: SessionConfig) -> (HostSession, FakeDevice) {
        let (host, dev) = LinkStream::pair().unwrap();
        let body = encode_descriptor(&test_descriptor()).unwrap();
        let device = thread::spawn(move || {
            let mut device = FakeDevice::new(dev);
            device.expect(PacketType::ResetRequest);
            device
                .writer
                .write_packet(&Packet::empty(PacketType::ResetResponse))
                .unwrap();
            device.expect(PacketType::DescriptorRequest);
            device
                .writer
                .send(PacketType::DescriptorResponse, body)
                .unwrap();
            device
        });

        let session = HostSession::establish_link(host, config).unwrap();
        (session, device.join().unwrap())
    }

    #[test]
    fn establish_exposes_descriptor() {
        let (session, _device) = start(test_config());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.descriptor().interfaces.len(), 1);
        assert_eq!(session.interface_index("thermo").unwrap(), 0);
        session.close();
    }

    #[test]
    fn write_property_sends_named_value() {
        let (session, mut device) = start(test_config());
        session
            .write_property(0, "sample_rate", Value::Float(500.0))
            .unwrap();

        let packet = device.expect(PacketType::PropertyRequest);
        let message = NamedValue::decode(&packet.body).unwrap();
        assert_eq!(message.interface, 0);
        assert_eq!(message.name, "sample_rate");
        assert_eq!(message.value(Schema::Float).unwrap(), Value::Float(500.0));
    }

    #[test]
    fn write_property_str_parses_with_schema() {
        let (session, mut device) = start(test_config());
        session.write_property_str(0, "sample_rate", "250").unwrap();
        let packet = device.expect(PacketType::PropertyRequest);
        let message = NamedValue::decode(&packet.body).unwrap();
        assert_eq!(message.value(Schema::Float).unwrap(), Value::Float(250.0));
    }

    #[test]
    fn write_property_local_rejections() {
        let (session, _device) = start(test_config());
        assert!(matches!(
            session.write_property(0, "nope", Value::Float(1.0)),
            Err(HostError::UnknownProperty { .. })
        ));
        assert!(matches!(
            session.write_property(0, "serial", Value::from("x")),
            Err(HostError::ReadOnly(_))
        ));
        assert!(matches!(
            session.write_property(0, "sample_rate", Value::Int(1)),
            Err(HostError::Value(_))
        ));
        assert!(matches!(
            session.write_property(3, "sample_rate", Value::Float(1.0)),
            Err(HostError::UnknownInterface(3))
        ));
    }

    #[test]
    fn events_reach_subscribers_and_unknown_names_are_dropped() {
        let (session, mut device) = start(test_config());
        let (tx, rx) = mpsc::channel();
        session.subscribe_events(move |n| {
            let _ = tx.send(n.clone());
        });

        device.reply(
            PacketType::EventNotification,
            0,
            NamedValue::new(0, "humidity", &Value::Float(40.0)),
        );
        device.reply(
            PacketType::EventNotification,
            0,
            NamedValue::new(0, "temperature", &Value::Float(21.5)),
        );

        let notification = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(notification.name, "temperature");
        assert_eq!(notification.interface_id, "thermo");
        assert_eq!(notification.value, Value::Float(21.5));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn subscriber_may_drop_the_session() {
        let (session, mut device) = start(test_config());
        let slot = Arc::new(Mutex::new(None::<HostSession>));
        let (tx, rx) = mpsc::channel();

        let holder = Arc::clone(&slot);
        session.subscribe_events(move |_| {
            let taken = holder.lock().take();
            if let Some(session) = taken {
                let on_rx = thread::current().name() == Some("serialpnp-host-rx");
                drop(session);
                let _ = tx.send(on_rx);
            }
        });
        *slot.lock() = Some(session);

        device.reply(
            PacketType::EventNotification,
            0,
            NamedValue::new(0, "temperature", &Value::Float(21.5)),
        );

        let on_rx = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("dropping the session inside a callback must return");
        assert!(on_rx);
        assert!(slot.lock().is_none());
    }

    #[test]
    fn property_notifications_reach_subscribers() {
        let (session, mut device) = start(test_config());
        let (tx, rx) = mpsc::channel();
        session.subscribe_property_notifications(move |n| {
            let _ = tx.send(n.clone());
        });

        device.reply(
            PacketType::PropertyNotification,
            0,
            NamedValue::new(0, "serial", &Value::from("SN-1")),
        );
        let notification = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(notification.value, Value::String("SN-1".into()));
    }

    #[test]
    fn read_property_waits_for_notification() {
        let (session, mut device) = start(test_config());
        let server = thread::spawn(move || {
            let packet = device.expect(PacketType::PropertyRequest);
            let message = NamedValue::decode(&packet.body).unwrap();
            assert!(message.payload.is_empty());
            device.reply(
                PacketType::PropertyNotification,
                0,
                NamedValue::new(0, "sample_rate", &Value::Float(100.0)),
            );
            device
        });

        let value = session
            .read_property(0, "sample_rate", Duration::from_secs(2))
            .unwrap();
        assert_eq!(value, Value::Float(100.0));
        server.join().unwrap();
    }

    #[test]
    fn confirmed_write_reports_device_status() {
        let (session, mut device) = start(test_config());
        let server = thread::spawn(move || {
            device.expect(PacketType::PropertyRequest);
            device.reply(
                PacketType::PropertyNotification,
                ResponseStatus::InvalidPayload.as_u8(),
                NamedValue::empty(0, "sample_rate"),
            );
            device.expect(PacketType::PropertyRequest);
            device.reply(
                PacketType::PropertyNotification,
                0,
                NamedValue::new(0, "sample_rate", &Value::Float(250.0)),
            );
            device
        });

        let err = session
            .write_property_confirmed(0, "sample_rate", Value::Float(-1.0), Duration::from_secs(2))
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::Remote {
                status: ResponseStatus::InvalidPayload,
                ..
            }
        ));

        let value = session
            .write_property_confirmed(0, "sample_rate", Value::Float(250.0), Duration::from_secs(2))
            .unwrap();
        assert_eq!(value, Value::Float(250.0));
        server.join().unwrap();
    }

    #[test]
    fn command_roundtrip() {
        let (session, mut device) = start(test_config());
        let server = thread::spawn(move || {
            let packet = device.expect(PacketType::CommandRequest);
            let message = NamedValue::decode(&packet.body).unwrap();
            let Value::Int(n) = message.value(Schema::Int).unwrap() else {
                panic!("expected int");
            };
            device.reply(
                PacketType::CommandResponse,
                0,
                NamedValue::new(0, "add_one", &Value::Int(n + 1)),
            );
            device
        });

        let response = session.invoke_command(0, "add_one", Value::Int(41)).unwrap();
        assert_eq!(response.value, Value::Int(42));
        server.join().unwrap();
    }

    #[test]
    fn remote_status_is_reported() {
        let (session, mut device) = start(test_config());
        let server = thread::spawn(move || {
            device.expect(PacketType::CommandRequest);
            device.reply(
                PacketType::CommandResponse,
                ResponseStatus::NotFound.as_u8(),
                NamedValue::empty(0, "add_one"),
            );
            device
        });

        let err = session
            .invoke_command(0, "add_one", Value::Int(1))
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::Remote {
                status: ResponseStatus::NotFound,
                ..
            }
        ));
        server.join().unwrap();
    }

    #[test]
    fn late_response_after_timeout_is_discarded() {
        let config = SessionConfig {
            command_timeout: Duration::from_millis(150),
            ..test_config()
        };
        let (session, mut device) = start(config);
        let (timed_out_tx, timed_out_rx) = mpsc::channel::<()>();

        let server = thread::spawn(move || {
            device.expect(PacketType::CommandRequest);
            timed_out_rx.recv().unwrap();
            // Answer to the first request, after its caller gave up.
            device.reply(
                PacketType::CommandResponse,
                0,
                NamedValue::new(0, "add_one", &Value::Int(-1)),
            );
            let second = device.expect(PacketType::CommandRequest);
            let Ok(Value::Int(n)) = NamedValue::decode(&second.body)
                .unwrap()
                .value(Schema::Int)
            else {
                panic!("expected int");
            };
            device.reply(
                PacketType::CommandResponse,
                0,
                NamedValue::new(0, "add_one", &Value::Int(n + 1)),
            );
            device
        });

        let err = session.invoke_command(0, "add_one", Value::Int(1)).unwrap_err();
        assert!(matches!(err, HostError::Timeout(_)));
        timed_out_tx.send(()).unwrap();
        // Give the receive loop time to drop the late response.
        thread::sleep(Duration::from_millis(100));

        let response = session.invoke_command(0, "add_one", Value::Int(10)).unwrap();
        assert_eq!(response.value, Value::Int(11));
        assert_eq!(session.state(), SessionState::Ready);
        server.join().unwrap();
    }

    #[test]
    fn concurrent_commands_never_interleave() {
        let (session, device) = start(test_config());
        let overlaps = Arc::new(AtomicUsize::new(0));
        let device_overlaps = Arc::clone(&overlaps);

        let server = thread::spawn(move || {
            let mut device = device;
            device
                .reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(50)))
                .unwrap();
            let mut handled = 0;
            while handled < 2 {
                let packet = match device.reader.read_packet() {
                    Ok(packet) => packet,
                    Err(err) if err.is_timeout() => continue,
                    Err(err) => panic!("device read failed: {err}"),
                };
                assert_eq!(packet.packet_type, PacketType::CommandRequest);
                // No second request may arrive before this one is answered.
                match device.reader.read_packet() {
                    Err(err) if err.is_timeout() => {}
                    _ => {
                        device_overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                }
                let message = NamedValue::decode(&packet.body).unwrap();
                let Ok(Value::Int(n)) = message.value(Schema::Int) else {
                    panic!("expected int");
                };
                device.reply(
                    PacketType::CommandResponse,
                    0,
                    NamedValue::new(0, "add_one", &Value::Int(n + 1)),
                );
                handled += 1;
            }
            device
        });

        thread::scope(|scope| {
            let a = scope.spawn(|| session.invoke_command(0, "add_one", Value::Int(100)));
            let b = scope.spawn(|| session.invoke_command(0, "add_one", Value::Int(200)));
            assert_eq!(a.join().unwrap().unwrap().value, Value::Int(101));
            assert_eq!(b.join().unwrap().unwrap().value, Value::Int(201));
        });

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        server.join().unwrap();
    }

    #[test]
    fn disconnect_wakes_command_waiter() {
        let (session, mut device) = start(test_config());
        let server = thread::spawn(move || {
            device.expect(PacketType::CommandRequest);
            drop(device);
        });

        let err = session
            .invoke_command(0, "add_one", Value::Int(1))
            .unwrap_err();
        assert!(matches!(err, HostError::Disconnected(_)));
        server.join().unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(matches!(
            session.write_property(0, "sample_rate", Value::Float(1.0)),
            Err(HostError::Disconnected(_))
        ));
    }
}
