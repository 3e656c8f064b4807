use rflink_frame::{decode_frame, FrameError};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_decoded, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.frame.to_config()?;
    let wire = parse_hex(&args.hex)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))?;

    let frame = decode_frame(&wire, &config)
        .map_err(|err| frame_error("decode failed", FrameError::from(err)))?;

    print_decoded(&frame, &wire, format);
    Ok(SUCCESS)
}
