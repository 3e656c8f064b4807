/// Errors reported by a packet-radio transceiver.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// The transceiver could not be brought up. Fatal at startup.
    #[error("transceiver init failed: {0}")]
    Init(String),

    /// A frame could not be put on the air.
    #[error("transmit failed: {0}")]
    Transmit(String),

    /// An I/O error occurred on the bus or device backing the transceiver.
    #[error("radio I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value was rejected by the transceiver.
    #[error("invalid radio configuration: {0}")]
    InvalidConfig(String),

    /// The transceiver has been detached from its medium.
    #[error("radio shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, RadioError>;
