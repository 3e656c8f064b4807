//! Acknowledged addressed datagrams over a shared packet-radio link.
//!
//! This is the "just works" layer. A [`Manager`] owns one transceiver and
//! gives the application:
//! - reliable sends with per-attempt acknowledgment timeouts and retries
//! - unreliable and broadcast sends
//! - duplicate suppression and acknowledgment of inbound datagrams
//! - bounded delivery to the application and link telemetry
//!
//! Everything runs on the caller's thread by cooperative polling.

pub mod config;
pub mod delivery;
pub mod error;
pub mod manager;
pub mod telemetry;

pub use config::DatagramConfig;
pub use delivery::{delivery_channel, Delivery, DeliverySender};
pub use error::{DatagramError, Result};
pub use manager::{Manager, PollEvent, SendOutcome, StopHandle};
pub use telemetry::{DropCounters, LinkTelemetry};
