use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialpnp_descriptor::{
    CommandDefinition, EventDefinition, PropertyDefinition, Schema, Value,
};
use serialpnp_device::{DeviceListener, EventEmitter, RuntimeBuilder};
use serialpnp_transport::{Endpoint, LinkStream};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SimulateArgs};
use crate::exit::{device_error, transport_error, CliResult, SUCCESS};

const SERIAL: &str = "SPNP-THERMO-0001";
const BASE_TEMPERATURE: f32 = 21.5;
/// One hour.
const MAX_SAMPLE_RATE_MS: f32 = 3_600_000.0;

/// Thermostat state, kept across host connections.
struct Thermo {
    sample_rate_ms: AtomicU32,
    offset: AtomicU32,
    tick: AtomicU64,
}

impl Thermo {
    fn new(sample_rate: Duration) -> Self {
        Self {
            sample_rate_ms: AtomicU32::new((sample_rate.as_millis() as f32).to_bits()),
            offset: AtomicU32::new(0f32.to_bits()),
            tick: AtomicU64::new(0),
        }
    }

    fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate_ms.load(Ordering::Relaxed))
    }

    fn offset(&self) -> f32 {
        f32::from_bits(self.offset.load(Ordering::Relaxed))
    }

    fn reading(&self) -> f32 {
        let tick = self.tick.load(Ordering::Relaxed) as f32;
        BASE_TEMPERATURE + self.offset() + 0.5 * (tick * 0.1).sin()
    }
}

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    let thermo = Arc::new(Thermo::new(parse_duration(&args.interval)?));

    let listener =
        DeviceListener::bind(&endpoint).map_err(|err| device_error("bind failed", err))?;
    info!(endpoint = %listener.local_endpoint(), "simulated thermostat listening");

    let mut served = 0usize;
    while args.connections.map_or(true, |max| served < max) {
        let builder =
            thermo_builder(Arc::clone(&thermo)).map_err(|err| device_error("setup failed", err))?;
        let mut runtime = listener
            .accept(builder)
            .map_err(|err| device_error("accept failed", err))?;

        let stop = Arc::new(AtomicBool::new(false));
        let ticker = spawn_ticker(runtime.emitter(), Arc::clone(&thermo), Arc::clone(&stop));

        let result = runtime.run();
        stop.store(true, Ordering::SeqCst);
        if ticker.join().is_err() {
            warn!("event thread panicked");
        }
        if let Err(err) = result {
            warn!(error = %err, "host session ended with an error");
        }
        served += 1;
    }

    Ok(SUCCESS)
}

fn thermo_builder(thermo: Arc<Thermo>) -> serialpnp_device::Result<RuntimeBuilder> {
    let mut builder = RuntimeBuilder::new("SerialPnP Thermostat")?;
    builder.new_interface("thermo")?;

    let rate = Arc::clone(&thermo);
    builder.new_property(
        PropertyDefinition::new("sample_rate", Schema::Float)
            .display_name("Sample rate")
            .description("Interval between temperature events")
            .units("ms")
            .writeable(true),
        move |update| {
            if let Some(Value::Float(v)) = update {
                if v > 0.0 && v <= MAX_SAMPLE_RATE_MS {
                    info!(sample_rate = v, "sample rate changed");
                    rate.sample_rate_ms.store(v.to_bits(), Ordering::Relaxed);
                } else {
                    warn!(sample_rate = v, "ignoring invalid sample rate");
                }
            }
            Value::Float(rate.sample_rate())
        },
    )?;
    builder.new_property(
        PropertyDefinition::new("serial", Schema::String)
            .display_name("Serial number")
            .required(true),
        |_| Value::from(SERIAL),
    )?;

    let calibrate = Arc::clone(&thermo);
    builder.new_command(
        CommandDefinition::new("calibrate", Schema::Float, Schema::Float)
            .display_name("Calibrate")
            .description("Set the sensor offset; returns the corrected reading"),
        move |input| {
            if let Value::Float(offset) = input {
                calibrate.offset.store(offset.to_bits(), Ordering::Relaxed);
            }
            Value::Float(calibrate.reading())
        },
    )?;

    builder.new_event(
        EventDefinition::new("temperature", Schema::Float)
            .display_name("Temperature")
            .units("C"),
    )?;

    builder.on_reset(|| info!("host reset the thermostat"));
    Ok(builder)
}

fn spawn_ticker(
    emitter: EventEmitter<LinkStream>,
    thermo: Arc<Thermo>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            let value = Value::Float(thermo.reading());
            if let Err(err) = emitter.send(0, "temperature", value) {
                warn!(error = %err, "stopping temperature events");
                return;
            }
            thermo.tick.fetch_add(1, Ordering::Relaxed);

            let period = Duration::from_secs_f32(thermo.sample_rate() / 1000.0);
            let deadline = Instant::now() + period;
            while !stop.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20).min(period));
            }
        }
    })
}
