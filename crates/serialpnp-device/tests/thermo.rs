//! Host session against a real peripheral runtime over an in-process link.

#![cfg(unix)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serialpnp_descriptor::{CommandDefinition, EventDefinition, PropertyDefinition, Schema, Value};
use serialpnp_device::RuntimeBuilder;
use serialpnp_host::{HostError, HostSession, SessionConfig, SessionState};
use serialpnp_transport::LinkStream;

fn session_config() -> SessionConfig {
    SessionConfig {
        response_timeout: Duration::from_secs(2),
        retry_interval: Duration::from_millis(50),
        command_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

#[test]
fn thermo_end_to_end() {
    let (host_link, device_link) = LinkStream::pair().unwrap();
    let (written_tx, written_rx) = mpsc::channel();

    let mut builder = RuntimeBuilder::new("Thermo").unwrap();
    builder.new_interface("thermo").unwrap();
    let mut rate = 1000.0f32;
    builder
        .new_property(
            PropertyDefinition::new("sample_rate", Schema::Float)
                .units("ms")
                .writeable(true),
            move |update| {
                if let Some(Value::Float(v)) = update {
                    rate = v;
                    let _ = written_tx.send(v);
                }
                Value::Float(rate)
            },
        )
        .unwrap();
    builder
        .new_event(EventDefinition::new("temperature", Schema::Float).units("C"))
        .unwrap();

    let mut runtime = builder
        .ready(device_link.try_clone().unwrap(), device_link)
        .unwrap();
    let emitter = runtime.emitter();
    let device = thread::spawn(move || runtime.run());

    let session = HostSession::establish_link(host_link, session_config()).unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let descriptor = session.descriptor();
    assert_eq!(descriptor.interfaces.len(), 1);
    let thermo = &descriptor.interfaces[0];
    assert_eq!(thermo.id, "thermo");
    assert_eq!(thermo.properties.len(), 1);
    assert_eq!(thermo.commands.len(), 0);
    assert_eq!(thermo.properties[0].units, "ms");
    assert!(thermo.properties[0].writeable);

    let (event_tx, event_rx) = mpsc::channel();
    session.subscribe_events(move |n| {
        let _ = event_tx.send((n.name.clone(), n.value.clone()));
    });

    session
        .write_property(0, "sample_rate", Value::Float(500.0))
        .unwrap();
    assert_eq!(written_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 500.0);

    emitter.send(0, "temperature", Value::Float(21.5)).unwrap();
    let (name, value) = event_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(name, "temperature");
    assert_eq!(value, Value::Float(21.5));

    let current = session
        .read_property(0, "sample_rate", Duration::from_secs(2))
        .unwrap();
    assert_eq!(current, Value::Float(500.0));

    session.close();
    device.join().unwrap().unwrap();
}

#[test]
fn commands_against_runtime() {
    let (host_link, device_link) = LinkStream::pair().unwrap();

    let mut builder = RuntimeBuilder::new("Calc").unwrap();
    builder.new_interface("calc").unwrap();
    builder
        .new_command(
            CommandDefinition::new("double", Schema::Long, Schema::Long),
            |input| match input {
                Value::Long(n) => Value::Long(n * 2),
                _ => Value::Unit,
            },
        )
        .unwrap();
    builder
        .new_command(
            CommandDefinition::new("greet", Schema::String, Schema::String),
            |input| Value::String(format!("hello {input}")),
        )
        .unwrap();

    let mut runtime = builder
        .ready(device_link.try_clone().unwrap(), device_link)
        .unwrap();
    let device = thread::spawn(move || runtime.run());

    let session = HostSession::establish_link(host_link, session_config()).unwrap();
    let calc = session.interface_index("calc").unwrap();

    let response = session.invoke_command_str(calc, "double", "21").unwrap();
    assert_eq!(response.value, Value::Long(42));

    let response = session
        .invoke_command(calc, "greet", Value::from("pnp"))
        .unwrap();
    assert_eq!(response.value, Value::String("hello pnp".into()));

    assert!(matches!(
        session.invoke_command(calc, "missing", Value::Unit),
        Err(HostError::UnknownCommand { .. })
    ));

    session.close();
    device.join().unwrap().unwrap();
}
