use rflink_frame::{Frame, Header};

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.frame.to_config()?;

    let payload = match (args.data, args.hex) {
        (Some(text), _) => text.into_bytes(),
        (None, Some(hex)) => parse_hex(&hex)
            .map_err(|err| CliError::new(USAGE, format!("invalid hex payload: {err}")))?,
        (None, None) => Vec::new(),
    };

    let frame = Frame::new(Header::new(args.to, args.from, args.id, args.flags), payload);
    let wire = frame
        .encode(&config)
        .map_err(|err| frame_error("encode failed", err))?;

    print_encoded(&frame, &wire, format);
    Ok(SUCCESS)
}
