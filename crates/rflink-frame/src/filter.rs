use crate::codec::Header;
use crate::flags::BROADCAST;

/// Decides which decoded frames a node hands to its protocol logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFilter {
    /// This node's address.
    pub address: u8,
    /// Accept frames regardless of destination (sniffing).
    pub promiscuous: bool,
}

impl AddressFilter {
    pub fn new(address: u8, promiscuous: bool) -> Self {
        Self {
            address,
            promiscuous,
        }
    }

    /// True if a frame with this header is for us, for everyone, or we are
    /// sniffing.
    pub fn accepts(&self, header: &Header) -> bool {
        self.promiscuous || header.to == self.address || header.to == BROADCAST
    }

    /// True if the frame is addressed to this node specifically.
    pub fn is_local(&self, header: &Header) -> bool {
        header.to == self.address
    }
}
