use std::time::Duration;

use rflink_frame::{FrameConfig, BROADCAST};

use crate::error::{DatagramError, Result};

/// Default number of transmissions per reliable send.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait for an acknowledgment after each transmission.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(200);

/// Longest accepted acknowledgment wait.
pub const MAX_ACK_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default sleep between polls when the radio has nothing ready.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default number of deliveries buffered for the application.
pub const DEFAULT_DELIVERY_CAPACITY: usize = 10;

/// Configuration for a [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramConfig {
    /// This node's address. Must not be the broadcast address.
    pub address: u8,
    /// Accept frames addressed to other nodes.
    pub promiscuous: bool,
    /// Total transmissions per reliable send, first attempt included.
    /// Values below 1 are treated as 1.
    pub max_retries: u32,
    /// Wait for an acknowledgment after each transmission.
    pub ack_timeout: Duration,
    /// Sleep between polls when no frame is ready.
    pub poll_interval: Duration,
    /// Deliveries buffered before new ones are dropped.
    pub delivery_capacity: usize,
    /// Frame codec settings shared by every node on the network.
    pub frame: FrameConfig,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            address: 1,
            promiscuous: false,
            max_retries: DEFAULT_MAX_RETRIES,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            delivery_capacity: DEFAULT_DELIVERY_CAPACITY,
            frame: FrameConfig::default(),
        }
    }
}

impl DatagramConfig {
    /// Default configuration for the node at `address`.
    pub fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn with_promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, ack_timeout: Duration) -> Self {
        self.max_retries = max_retries;
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Transmissions actually attempted per reliable send.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address == BROADCAST {
            return Err(DatagramError::InvalidAddress(self.address));
        }
        if self.ack_timeout.is_zero() {
            return Err(DatagramError::InvalidConfig(
                "ack_timeout must be greater than zero".to_string(),
            ));
        }
        if self.ack_timeout > MAX_ACK_TIMEOUT {
            return Err(DatagramError::InvalidConfig(format!(
                "ack_timeout {:?} exceeds {:?}",
                self.ack_timeout, MAX_ACK_TIMEOUT
            )));
        }
        if self.delivery_capacity == 0 {
            return Err(DatagramError::InvalidConfig(
                "delivery_capacity must be at least 1".to_string(),
            ));
        }
        self.frame.validate()?;
        Ok(())
    }
}
