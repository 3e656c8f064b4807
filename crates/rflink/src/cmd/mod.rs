use std::time::Duration;

use clap::{Args, Subcommand};
use rflink_frame::{FrameConfig, DEFAULT_PREAMBLE_LEN};

use crate::exit::{frame_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a server and a client node over a simulated radio medium.
    Simulate(SimulateArgs),
    /// Build a frame and print it as hex.
    Encode(EncodeArgs),
    /// Decode a hex frame and print its contents.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Codec settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    /// Network sync word as 4 hex digits (e.g. 2DD4).
    #[arg(long, env = "RFLINK_SYNC_WORD", default_value = "2DD4", value_parser = parse_sync_word)]
    pub sync_word: [u8; 2],
    /// Group id; shorthand for sync word 2D<group>.
    #[arg(long, env = "RFLINK_GROUP", value_parser = parse_u8, conflicts_with = "sync_word")]
    pub group: Option<u8>,
    /// Preamble bytes before the sync word.
    #[arg(long, env = "RFLINK_PREAMBLE_LEN", default_value_t = DEFAULT_PREAMBLE_LEN)]
    pub preamble_len: usize,
}

impl FrameArgs {
    pub fn to_config(&self) -> CliResult<FrameConfig> {
        let mut config = FrameConfig {
            sync_word: self.sync_word,
            preamble_len: self.preamble_len,
            ..FrameConfig::default()
        };
        if let Some(group) = self.group {
            config = config.with_group(group);
        }
        config
            .validate()
            .map_err(|err| frame_error("invalid frame settings", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Server node address.
    #[arg(long, env = "RFLINK_SERVER_ADDRESS", default_value = "2", value_parser = parse_u8)]
    pub server: u8,
    /// Client node address.
    #[arg(long, env = "RFLINK_CLIENT_ADDRESS", default_value = "1", value_parser = parse_u8)]
    pub client: u8,
    /// Number of datagrams the client sends.
    #[arg(long, default_value_t = 3)]
    pub count: u32,
    /// Payload the client sends.
    #[arg(long, default_value = "Hello World!")]
    pub data: String,
    /// Have the server answer each datagram and the client wait for it.
    #[arg(long)]
    pub reply: bool,
    /// Add a promiscuous node at this address that reports everything it hears.
    #[arg(long, value_parser = parse_u8)]
    pub sniffer: Option<u8>,
    /// Transmissions per reliable send.
    #[arg(long, env = "RFLINK_MAX_RETRIES", default_value_t = 3)]
    pub retries: u32,
    /// Wait for an acknowledgment after each transmission (e.g. 200ms, 1s).
    #[arg(long, env = "RFLINK_ACK_TIMEOUT", default_value = "200ms")]
    pub ack_timeout: String,
    /// Pause between client sends.
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// How long the client waits for each reply when --reply is set.
    #[arg(long, default_value = "2s")]
    pub reply_timeout: String,
    /// Lose every Nth transmission on the medium.
    #[arg(long)]
    pub drop_every: Option<u32>,
    /// Corrupt every Nth transmission on the medium.
    #[arg(long)]
    pub corrupt_every: Option<u32>,
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Destination address (255 for broadcast).
    #[arg(long, value_parser = parse_u8)]
    pub to: u8,
    /// Source address.
    #[arg(long, value_parser = parse_u8)]
    pub from: u8,
    /// Sequence id.
    #[arg(long, default_value = "0", value_parser = parse_u8)]
    pub id: u8,
    /// Flag bits (e.g. 0x01 for ACK).
    #[arg(long, default_value = "0", value_parser = parse_u8)]
    pub flags: u8,
    /// Text payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex; spaces and colons are ignored.
    pub hex: String,
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    const MAX_SECS: u64 = 24 * 60 * 60;

    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    };
    if duration > Duration::from_secs(MAX_SECS) {
        return Err(CliError::new(
            USAGE,
            format!("duration {input} exceeds {MAX_SECS}s"),
        ));
    }
    Ok(duration)
}

/// Parse a byte given in decimal or with a `0x` prefix.
pub fn parse_u8(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("expected a byte (0-255 or 0x00-0xFF), got {input:?}"))
}

pub fn parse_sync_word(input: &str) -> Result<[u8; 2], String> {
    match parse_hex(input)?.as_slice() {
        [high, low] => Ok([*high, *low]),
        other => Err(format!(
            "sync word must be 2 bytes (4 hex digits), got {}",
            other.len()
        )),
    }
}

/// Parse hex bytes, ignoring whitespace, colons and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err("hex input has an odd number of digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|_| "hex input is not ASCII".to_string())?;
            u8::from_str_radix(text, 16).map_err(|_| format!("invalid hex byte {text:?}"))
        })
        .collect()
}
