//! Addressed radio frames with a CRC-16 integrity trailer.
//!
//! Every frame on the air is laid out as:
//! - A preamble of `0xAA` bytes for receiver clock recovery
//! - A 2-byte sync word identifying the network
//! - A 4-byte header: destination, source, sequence id, flags
//! - A 1-byte payload length and up to 251 payload bytes
//! - A 2-byte little-endian CRC-16/IBM over header, length and payload
//!
//! Decoding is all-or-nothing: a buffer either yields a [`Frame`] or a
//! [`DecodeError`] naming the first check that failed.

pub mod codec;
pub mod crc;
pub mod error;
pub mod filter;
pub mod flags;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, Header, CRC_SIZE, DEFAULT_PREAMBLE_LEN,
    DEFAULT_SYNC_WORD, HEADER_SIZE, MAX_PAYLOAD, MAX_PREAMBLE_LEN, PREAMBLE_BYTE, SYNC_SIZE,
};
pub use error::{DecodeError, DecodeErrorKind, FrameError, Result};
pub use filter::AddressFilter;
pub use flags::{ACK, BROADCAST, NO_ACK_NEEDED, RETRY};
