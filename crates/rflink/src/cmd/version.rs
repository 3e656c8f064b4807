use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rflink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: rflink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("RFLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "frame: crc16-ibm, max_payload={}, default_sync={:02X}{:02X}",
        rflink_frame::MAX_PAYLOAD,
        rflink_frame::DEFAULT_SYNC_WORD[0],
        rflink_frame::DEFAULT_SYNC_WORD[1]
    );
    println!("transceivers: sim-ether");

    Ok(SUCCESS)
}
