use serialpnp_descriptor::Value;
use serialpnp_host::HostError;

use crate::cmd::{interface_label, resolve_interface, SetArgs};
use crate::exit::{host_error, value_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.connect()?;
    let interface = resolve_interface(&session, &args.interface)?;
    let schema = session
        .descriptor()
        .property(interface, &args.property)
        .map(|p| p.schema)
        .ok_or_else(|| {
            host_error(
                "write failed",
                HostError::UnknownProperty {
                    interface,
                    name: args.property.clone(),
                },
            )
        })?;
    let value = Value::parse(schema, &args.value).map_err(|err| value_error("invalid value", err))?;

    let current = session
        .write_property_confirmed(
            interface,
            &args.property,
            value,
            args.connect.response_timeout()?,
        )
        .map_err(|err| host_error("write failed", err))?;

    print_value(
        "property",
        &interface_label(&session, interface),
        &args.property,
        &current,
        format,
    );
    session.close();
    Ok(SUCCESS)
}
