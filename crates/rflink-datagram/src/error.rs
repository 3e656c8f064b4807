/// Errors that can occur in datagram operations.
#[derive(Debug, thiserror::Error)]
pub enum DatagramError {
    /// Transceiver error. Fatal when raised during startup.
    #[error("radio error: {0}")]
    Radio(#[from] rflink_radio::RadioError),

    /// Frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] rflink_frame::FrameError),

    /// The address cannot be used as a node address.
    #[error("invalid node address 0x{0:02X}")]
    InvalidAddress(u8),

    /// A configuration value is out of range.
    #[error("invalid datagram configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DatagramError>;
