//! Reliable addressed datagrams over shared packet-radio links.
//!
//! rflink turns a half-duplex packet radio into a small datagram network:
//! addressed frames with an integrity trailer, acknowledgments, retries,
//! duplicate suppression, broadcast and promiscuous reception.
//!
//! # Crate Structure
//!
//! - [`radio`]: transceiver capability and an in-memory shared medium
//! - [`frame`]: wire format, CRC-16 trailer and address filtering
//! - [`datagram`]: the reliable datagram manager and link telemetry

/// Re-export radio types.
pub mod radio {
    pub use rflink_radio::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rflink_frame::*;
}

/// Re-export datagram types.
pub mod datagram {
    pub use rflink_datagram::*;
}
