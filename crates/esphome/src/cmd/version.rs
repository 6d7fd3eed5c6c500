use esphome_proto::{API_VERSION_MAJOR, API_VERSION_MINOR};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("esphome {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: esphome");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("api_version: {API_VERSION_MAJOR}.{API_VERSION_MINOR}");
    println!(
        "build_target: {}",
        option_env!("ESPHOME_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}
