use std::time::Duration;

use clap::{Args, Subcommand};
use serialpnp_host::{HostSession, SessionConfig};
use serialpnp_transport::Endpoint;

use crate::exit::{host_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod get;
pub mod invoke;
pub mod monitor;
pub mod probe;
pub mod set;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device and print its descriptor.
    Probe(ProbeArgs),
    /// Write a property.
    Set(SetArgs),
    /// Read a property.
    Get(GetArgs),
    /// Invoke a command and print its response.
    Invoke(InvokeArgs),
    /// Print events and property notifications as they arrive.
    Monitor(MonitorArgs),
    /// Run a simulated thermostat peripheral.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Invoke(args) => invoke::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every subcommand that connects to a device.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Device endpoint (`unix:/path`, `tcp:host:port`, or a socket path).
    pub endpoint: String,
    /// Time to wait for each reset/descriptor response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Reset and descriptor attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,
    /// Pause between attempts.
    #[arg(long, default_value = "1s")]
    pub retry_interval: String,
    /// Time to wait for a command response.
    #[arg(long, default_value = "60s")]
    pub command_timeout: String,
}

impl ConnectArgs {
    pub fn endpoint(&self) -> CliResult<Endpoint> {
        self.endpoint
            .parse()
            .map_err(|err| transport_error("invalid endpoint", err))
    }

    pub fn session_config(&self) -> CliResult<SessionConfig> {
        Ok(SessionConfig {
            reset_attempts: self.attempts,
            retry_interval: parse_duration(&self.retry_interval)?,
            response_timeout: parse_duration(&self.timeout)?,
            command_timeout: parse_duration(&self.command_timeout)?,
            ..SessionConfig::default()
        })
    }

    pub fn connect(&self) -> CliResult<HostSession> {
        let endpoint = self.endpoint()?;
        let config = self.session_config()?;
        serialpnp_host::connect_with_config(&endpoint, config)
            .map_err(|err| host_error("connect failed", err))
    }

    pub fn response_timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Interface id or index.
    pub interface: String,
    /// Property name.
    pub property: String,
    /// New value, parsed with the property's schema.
    pub value: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Interface id or index.
    pub interface: String,
    /// Property name.
    pub property: String,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Interface id or index.
    pub interface: String,
    /// Command name.
    pub command: String,
    /// Request payload, parsed with the command's request schema.
    #[arg(default_value = "")]
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
    /// Skip property notifications; print events only.
    #[arg(long)]
    pub events_only: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Endpoint to listen on (`unix:/path`, `tcp:host:port`, or a socket path).
    pub endpoint: String,
    /// Interval between temperature events (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after serving N host connections.
    #[arg(long)]
    pub connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Resolve an interface given by id or by wire index.
pub fn resolve_interface(session: &HostSession, interface: &str) -> CliResult<u8> {
    if let Ok(index) = interface.parse::<u8>() {
        if session.descriptor().interface(index).is_some() {
            return Ok(index);
        }
    }
    session
        .interface_index(interface)
        .map_err(|err| host_error("lookup failed", err))
}

/// Interface id for display.
pub fn interface_label(session: &HostSession, index: u8) -> String {
    session
        .descriptor()
        .interface(index)
        .map(|iface| iface.id.clone())
        .unwrap_or_else(|| index.to_string())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
