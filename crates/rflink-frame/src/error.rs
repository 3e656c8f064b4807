/// Why a received buffer was rejected as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// No sync word where one was expected. Usually channel noise.
    #[error("invalid sync word")]
    InvalidSync,

    /// The length byte disagrees with the bytes actually received, or
    /// declares more payload than the codec accepts. Both counts are bytes
    /// after the sync word.
    #[error("length mismatch (frame declares {declared} bytes after sync, {available} received)")]
    LengthMismatch { declared: usize, available: usize },

    /// The integrity trailer does not match the frame contents.
    #[error("crc mismatch (trailer 0x{received:04X}, computed 0x{computed:04X})")]
    CrcMismatch { received: u16, computed: u16 },
}

/// Coarse classification of [`DecodeError`] used for drop counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    InvalidSync,
    LengthMismatch,
    CrcMismatch,
}

impl DecodeError {
    /// Counter bucket for this error.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::InvalidSync => DecodeErrorKind::InvalidSync,
            DecodeError::LengthMismatch { .. } => DecodeErrorKind::LengthMismatch,
            DecodeError::CrcMismatch { .. } => DecodeErrorKind::CrcMismatch,
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The codec configuration is unusable.
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),

    /// A received buffer was not a valid frame.
    #[error("frame rejected: {0}")]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
