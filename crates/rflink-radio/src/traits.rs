use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// Operating mode of a half-duplex transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Neither transmitting nor listening.
    #[default]
    Idle,
    /// Putting a frame on the air.
    Transmit,
    /// Listening for frames.
    Receive,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Transmit => "transmit",
            Mode::Receive => "receive",
        };
        f.write_str(name)
    }
}

/// One raw frame pulled off the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReception {
    /// Bytes as delivered by the radio, starting at the preamble or sync word.
    pub bytes: Bytes,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

/// The capability the protocol core consumes from a packet radio.
///
/// Implementations own every hardware detail. In particular, whether
/// [`frame_ready`](Transceiver::frame_ready) is backed by an edge-triggered
/// interrupt latch or a level-sampled IRQ line is invisible to callers.
pub trait Transceiver {
    /// Bring the device up. A failure here is fatal: callers must not enter
    /// their polling loop.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Switch operating mode.
    fn set_mode(&mut self, mode: Mode) -> Result<()>;

    /// Current operating mode.
    fn mode(&self) -> Mode;

    /// Non-blocking check for a completely received frame.
    fn frame_ready(&mut self) -> Result<bool>;

    /// Take the received frame, if any, together with its signal strength.
    ///
    /// The radio is left idle; callers restore receive mode when done.
    fn receive_raw(&mut self) -> Result<Option<RawReception>>;

    /// Transmit raw bytes, blocking until the frame has physically left.
    ///
    /// The radio is left idle afterwards.
    fn transmit_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Configure the local node address and promiscuous reception.
    fn set_address(&mut self, address: u8, promiscuous: bool) -> Result<()>;

    /// Transceiver name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        (**self).set_mode(mode)
    }

    fn mode(&self) -> Mode {
        (**self).mode()
    }

    fn frame_ready(&mut self) -> Result<bool> {
        (**self).frame_ready()
    }

    fn receive_raw(&mut self) -> Result<Option<RawReception>> {
        (**self).receive_raw()
    }

    fn transmit_raw(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).transmit_raw(bytes)
    }

    fn set_address(&mut self, address: u8, promiscuous: bool) -> Result<()> {
        (**self).set_address(address, promiscuous)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
