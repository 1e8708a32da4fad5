use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialpnp_descriptor::{DeviceDescriptor, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DescriptorOutput<'a> {
    schema_id: &'static str,
    endpoint: &'a str,
    descriptor: &'a DeviceDescriptor,
}

pub fn print_descriptor(descriptor: &DeviceDescriptor, endpoint: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&DescriptorOutput {
            schema_id: "https://schemas.3leaps.dev/serialpnp/cli/v1/device-descriptor.schema.json",
            endpoint,
            descriptor,
        }),
        OutputFormat::Table => {
            println!("{} (descriptor v{})", descriptor.display_name, descriptor.version);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INTERFACE", "KIND", "NAME", "SCHEMA", "UNITS", "FLAGS"]);
            for (index, iface) in descriptor.interfaces.iter().enumerate() {
                let label = format!("{index}:{}", iface.id);
                for p in &iface.properties {
                    table.add_row(vec![
                        label.clone(),
                        "property".to_string(),
                        p.field.name.clone(),
                        p.schema.to_string(),
                        p.units.clone(),
                        property_flags(p.writeable, p.required),
                    ]);
                }
                for c in &iface.commands {
                    table.add_row(vec![
                        label.clone(),
                        "command".to_string(),
                        c.field.name.clone(),
                        format!("{} -> {}", c.request_schema, c.response_schema),
                        String::new(),
                        String::new(),
                    ]);
                }
                for e in &iface.events {
                    table.add_row(vec![
                        label.clone(),
                        "event".to_string(),
                        e.field.name.clone(),
                        e.schema.to_string(),
                        e.units.clone(),
                        String::new(),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device: {} (descriptor v{})", descriptor.display_name, descriptor.version);
            for (index, iface) in descriptor.interfaces.iter().enumerate() {
                println!("  Interface {index}: {}", iface.id);
                for p in &iface.properties {
                    println!(
                        "    property {} : {} {} [{}]",
                        p.field.name,
                        p.schema,
                        p.units,
                        property_flags(p.writeable, p.required)
                    );
                }
                for c in &iface.commands {
                    println!(
                        "    command  {} : {} -> {}",
                        c.field.name, c.request_schema, c.response_schema
                    );
                }
                for e in &iface.events {
                    println!("    event    {} : {} {}", e.field.name, e.schema, e.units);
                }
            }
        }
        OutputFormat::Raw => {
            for iface in &descriptor.interfaces {
                println!("{}", iface.id);
            }
        }
    }
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    schema_id: &'static str,
    kind: &'a str,
    interface: &'a str,
    name: &'a str,
    schema: String,
    value: &'a Value,
    timestamp: String,
}

/// One named value: a property reading, a command response or an event.
pub fn print_value(
    kind: &str,
    interface: &str,
    name: &str,
    value: &Value,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&ValueOutput {
            schema_id: "https://schemas.3leaps.dev/serialpnp/cli/v1/named-value.schema.json",
            kind,
            interface,
            name,
            schema: value.schema().to_string(),
            value,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "INTERFACE", "NAME", "SCHEMA", "VALUE"])
                .add_row(vec![
                    kind.to_string(),
                    interface.to_string(),
                    name.to_string(),
                    value.schema().to_string(),
                    value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{kind} {interface}/{name} = {value} ({})", value.schema());
        }
        OutputFormat::Raw => println!("{value}"),
    }
}

fn property_flags(writeable: bool, required: bool) -> String {
    let mut flags = Vec::new();
    flags.push(if writeable { "rw" } else { "ro" });
    if required {
        flags.push("required");
    }
    flags.join(",")
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
