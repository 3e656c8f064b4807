//! Header flag bits and reserved addresses.
//!
//! Bits 0-2 carry protocol meaning. Bits 3-7 are reserved: they are sent as
//! given and ignored on receive.

/// Destination address meaning "every node". Never acknowledged.
pub const BROADCAST: u8 = 0xFF;

/// This frame acknowledges the data frame with the same id.
pub const ACK: u8 = 0x01;

/// The sender will neither wait for nor accept an acknowledgment.
pub const NO_ACK_NEEDED: u8 = 0x02;

/// This frame is a retransmission. Informational only.
pub const RETRY: u8 = 0x04;

/// Bits with no protocol meaning.
pub const RESERVED: u8 = !(ACK | NO_ACK_NEEDED | RETRY);

/// Returns true if `address` is the broadcast address.
pub fn is_broadcast(address: u8) -> bool {
    address == BROADCAST
}

/// Human-readable flag list, e.g. `ACK|RETRY`, or `-` when clear.
pub fn describe(flags: u8) -> String {
    let mut names = Vec::new();
    if flags & ACK != 0 {
        names.push("ACK".to_string());
    }
    if flags & NO_ACK_NEEDED != 0 {
        names.push("NO_ACK".to_string());
    }
    if flags & RETRY != 0 {
        names.push("RETRY".to_string());
    }
    if flags & RESERVED != 0 {
        names.push(format!("0x{:02X}", flags & RESERVED));
    }
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join("|")
    }
}
