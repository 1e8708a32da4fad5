use crate::cmd::{interface_label, resolve_interface, InvokeArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: InvokeArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.connect()?;
    let interface = resolve_interface(&session, &args.interface)?;
    let response = session
        .invoke_command_str(interface, &args.command, &args.payload)
        .map_err(|err| host_error("invoke failed", err))?;

    print_value(
        "command",
        &interface_label(&session, interface),
        &response.name,
        &response.value,
        format,
    );
    session.close();
    Ok(SUCCESS)
}
