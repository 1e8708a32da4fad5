use crate::cmd::{interface_label, resolve_interface, GetArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.connect()?;
    let interface = resolve_interface(&session, &args.interface)?;
    let value = session
        .read_property(interface, &args.property, args.connect.response_timeout()?)
        .map_err(|err| host_error("read failed", err))?;

    print_value(
        "property",
        &interface_label(&session, interface),
        &args.property,
        &value,
        format,
    );
    session.close();
    Ok(SUCCESS)
}
