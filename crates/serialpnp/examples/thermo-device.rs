//! Minimal peripheral: one `thermo` interface with a writeable sample rate
//! and a temperature event, served to one host at a time.
//!
//! Run with:
//!   cargo run --example thermo-device --features device
//!
//! In another terminal:
//!   cargo run --features cli -- probe /tmp/serialpnp-thermo-<pid>/thermo.sock
//!   cargo run --features cli -- set /tmp/serialpnp-thermo-<pid>/thermo.sock thermo sample_rate 250

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serialpnp::descriptor::{EventDefinition, PropertyDefinition, Schema, Value};
use serialpnp::device::{DeviceListener, RuntimeBuilder};
use serialpnp::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("serialpnp-thermo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("thermo.sock");
    let _ = fs::remove_file(&sock_path);

    let listener = DeviceListener::bind(&Endpoint::Unix(sock_path.clone()))?;
    eprintln!("Listening on {}", sock_path.display());

    let sample_rate = Arc::new(AtomicI32::new(1000));

    loop {
        let mut builder = RuntimeBuilder::new("Example Thermostat")?;
        builder.new_interface("thermo")?;

        let rate = Arc::clone(&sample_rate);
        builder.new_property(
            PropertyDefinition::new("sample_rate", Schema::Int)
                .units("ms")
                .writeable(true),
            move |update| {
                if let Some(Value::Int(ms)) = update {
                    if ms > 0 {
                        rate.store(ms, Ordering::Relaxed);
                    }
                }
                Value::Int(rate.load(Ordering::Relaxed))
            },
        )?;
        builder.new_event(EventDefinition::new("temperature", Schema::Float).units("C"))?;

        let mut runtime = listener.accept(builder)?;
        eprintln!("Host connected");

        // Events go out from a second thread while the runtime answers requests.
        let emitter = runtime.emitter();
        let rate = Arc::clone(&sample_rate);
        let stop = Arc::new(AtomicBool::new(false));
        let ticker_stop = Arc::clone(&stop);
        let ticker = thread::spawn(move || {
            let mut reading = 20.0f32;
            while !ticker_stop.load(Ordering::Relaxed) {
                if emitter.send(0, "temperature", Value::Float(reading)).is_err() {
                    break;
                }
                reading += 0.25;
                let ms = rate.load(Ordering::Relaxed).max(1) as u64;
                thread::sleep(Duration::from_millis(ms));
            }
        });

        if let Err(e) = runtime.run() {
            eprintln!("Host session ended: {e}");
        } else {
            eprintln!("Host disconnected");
        }
        stop.store(true, Ordering::Relaxed);
        let _ = ticker.join();
    }
}
