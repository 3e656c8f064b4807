//! Packet-radio transceiver capability.
//!
//! This is the lowest layer of rflink. The protocol core talks to hardware only
//! through the [`Transceiver`] trait:
//! - mode control (idle / transmit / receive)
//! - non-blocking "frame ready" polling
//! - raw frame transmit and receive with signal strength
//! - local address and promiscuous configuration
//!
//! Register access, SPI/GPIO wiring and interrupt edge/level detection belong to
//! concrete drivers. [`sim`] provides an in-memory shared medium for tests and demos.

pub mod error;
pub mod sim;
pub mod traits;

pub use error::{RadioError, Result};
pub use sim::{Ether, EtherConfig, EtherStats, FaultPlan, SimRadio};
pub use traits::{Mode, RawReception, Transceiver};
