use crate::cmd::ProbeArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_descriptor, OutputFormat};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.connect()?;
    print_descriptor(session.descriptor(), &args.connect.endpoint, format);
    session.close();
    Ok(SUCCESS)
}
