use std::fmt;
use std::io;

use rflink_datagram::DatagramError;
use rflink_frame::FrameError;
use rflink_radio::RadioError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const RADIO_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => RADIO_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn radio_error(context: &str, err: RadioError) -> CliError {
    match err {
        RadioError::Io(source) => io_error(context, source),
        RadioError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        RadioError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(RADIO_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } | FrameError::Decode(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn datagram_error(context: &str, err: DatagramError) -> CliError {
    match err {
        DatagramError::Radio(err) => radio_error(context, err),
        DatagramError::Frame(err) => frame_error(context, err),
        DatagramError::InvalidAddress(_) | DatagramError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}
