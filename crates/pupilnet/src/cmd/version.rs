use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pupilnet {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pupilnet");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PUPILNET_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("PUPILNET_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("libzmq: {}", zmq_version());
    println!(
        "features: remote={}, zmq={}, mock={}, cli=true",
        cfg!(feature = "remote"),
        cfg!(feature = "zmq"),
        cfg!(feature = "mock")
    );

    Ok(SUCCESS)
}

fn zmq_version() -> String {
    let (major, minor, patch) = pupilnet_transport::zeromq::library_version();
    format!("{major}.{minor}.{patch}")
}
