use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("serialpnp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: serialpnp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SERIALPNP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "protocol: descriptor v{}, max packet {} bytes",
        serialpnp_descriptor::PROTOCOL_VERSION,
        serialpnp_frame::DEFAULT_MAX_PACKET_SIZE
    );
    println!(
        "features: host={}, device={}, async={}, cli=true",
        cfg!(feature = "host"),
        cfg!(feature = "device"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
