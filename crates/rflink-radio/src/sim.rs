//! In-memory shared radio medium.
//!
//! Every radio attached to an [`Ether`] hears every transmission made by the
//! others, the way nodes on one frequency do. The medium is lossless unless a
//! [`FaultPlan`] says otherwise; faults are deterministic so tests can assert
//! exact retry counts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{RadioError, Result};
use crate::traits::{Mode, RawReception, Transceiver};

/// Deterministic fault injection applied to every transmission.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Drop every Nth transmission on the medium (1-based count).
    pub drop_every: Option<u32>,
    /// Flip one bit of the integrity trailer on every Nth transmission.
    pub corrupt_every: Option<u32>,
    /// Address pairs that cannot hear each other, in either direction.
    pub severed: Vec<(u8, u8)>,
}

/// Configuration for a simulated medium.
#[derive(Debug, Clone)]
pub struct EtherConfig {
    /// Receive FIFO depth per radio. Frames arriving at a full FIFO are lost.
    pub rx_capacity: usize,
    /// Signal strength reported when no per-link value is set.
    pub default_rssi: i16,
    /// Fault injection.
    pub faults: FaultPlan,
}

impl Default for EtherConfig {
    fn default() -> Self {
        Self {
            rx_capacity: 8,
            default_rssi: -40,
            faults: FaultPlan::default(),
        }
    }
}

/// Counters kept by the medium itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EtherStats {
    /// Transmissions put on the medium.
    pub transmissions: u64,
    /// Copies placed into receiver FIFOs.
    pub delivered: u64,
    /// Transmissions lost to fault injection.
    pub dropped: u64,
    /// Transmissions corrupted by fault injection.
    pub corrupted: u64,
    /// Copies lost because a receiver FIFO was full.
    pub overflowed: u64,
}

struct Station {
    address: u8,
    fifo: VecDeque<RawReception>,
    attached: bool,
}

struct EtherState {
    config: EtherConfig,
    stations: Vec<Station>,
    link_rssi: HashMap<(u8, u8), i16>,
    severed: HashSet<(u8, u8)>,
    pending_drops: u32,
    stats: EtherStats,
}

impl EtherState {
    fn is_severed(&self, from: u8, to: u8) -> bool {
        self.severed.contains(&(from, to)) || self.severed.contains(&(to, from))
    }
}

/// A shared medium connecting any number of [`SimRadio`]s.
#[derive(Clone)]
pub struct Ether {
    inner: Arc<Mutex<EtherState>>,
}

impl Default for Ether {
    fn default() -> Self {
        Self::new()
    }
}

impl Ether {
    /// Create a lossless medium.
    pub fn new() -> Self {
        Self::with_config(EtherConfig::default())
    }

    /// Create a medium with explicit configuration.
    pub fn with_config(config: EtherConfig) -> Self {
        let severed = config.faults.severed.iter().copied().collect();
        Self {
            inner: Arc::new(Mutex::new(EtherState {
                config,
                stations: Vec::new(),
                link_rssi: HashMap::new(),
                severed,
                pending_drops: 0,
                stats: EtherStats::default(),
            })),
        }
    }

    /// Attach a new radio to the medium. Its address starts at 0 until
    /// [`Transceiver::set_address`] is called.
    pub fn attach(&self) -> SimRadio {
        let mut state = self.lock();
        let station = state.stations.len();
        state.stations.push(Station {
            address: 0,
            fifo: VecDeque::new(),
            attached: true,
        });
        SimRadio {
            ether: self.clone(),
            station,
            mode: Mode::Idle,
            promiscuous: false,
            init_failure: None,
        }
    }

    /// Lose the next `count` transmissions regardless of the fault plan.
    pub fn drop_next(&self, count: u32) {
        let mut state = self.lock();
        state.pending_drops = state.pending_drops.saturating_add(count);
    }

    /// Cut (or restore) the link between two addresses.
    pub fn set_severed(&self, a: u8, b: u8, severed: bool) {
        let mut state = self.lock();
        if severed {
            state.severed.insert((a, b));
        } else {
            state.severed.remove(&(a, b));
            state.severed.remove(&(b, a));
        }
    }

    /// Signal strength seen by `to` for frames sent by `from`.
    pub fn set_link_rssi(&self, from: u8, to: u8, rssi: i16) {
        self.lock().link_rssi.insert((from, to), rssi);
    }

    /// Snapshot of the medium counters.
    pub fn stats(&self) -> EtherStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, EtherState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, sender: usize, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock();
        let from = match state.stations.get(sender) {
            Some(station) if station.attached => station.address,
            _ => return Err(RadioError::Shutdown),
        };

        state.stats.transmissions += 1;
        let seq = state.stats.transmissions;

        if state.pending_drops > 0 {
            state.pending_drops -= 1;
            state.stats.dropped += 1;
            debug!(from, seq, "transmission lost (scheduled drop)");
            return Ok(());
        }
        if let Some(n) = state.config.faults.drop_every {
            if n > 0 && seq % u64::from(n) == 0 {
                state.stats.dropped += 1;
                debug!(from, seq, every = n, "transmission lost (periodic drop)");
                return Ok(());
            }
        }

        let mut frame = bytes.to_vec();
        if let Some(n) = state.config.faults.corrupt_every {
            if n > 0 && seq % u64::from(n) == 0 {
                if let Some(last) = frame.last_mut() {
                    *last ^= 0x01;
                    state.stats.corrupted += 1;
                    debug!(from, seq, every = n, "transmission corrupted");
                }
            }
        }
        let frame = Bytes::from(frame);

        let capacity = state.config.rx_capacity;
        let default_rssi = state.config.default_rssi;
        for index in 0..state.stations.len() {
            if index == sender {
                continue;
            }
            let to = state.stations[index].address;
            if !state.stations[index].attached || state.is_severed(from, to) {
                continue;
            }
            let rssi = state
                .link_rssi
                .get(&(from, to))
                .copied()
                .unwrap_or(default_rssi);

            if state.stations[index].fifo.len() >= capacity {
                state.stats.overflowed += 1;
                trace!(from, to, "receiver fifo full, frame lost");
                continue;
            }
            state.stations[index].fifo.push_back(RawReception {
                bytes: frame.clone(),
                rssi,
            });
            state.stats.delivered += 1;
        }
        Ok(())
    }
}

/// A simulated transceiver attached to an [`Ether`].
pub struct SimRadio {
    ether: Ether,
    station: usize,
    mode: Mode,
    promiscuous: bool,
    init_failure: Option<String>,
}

impl SimRadio {
    /// Make [`Transceiver::init`] fail with the given reason.
    pub fn with_init_failure(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    /// Address currently configured on this radio.
    pub fn address(&self) -> u8 {
        self.ether
            .lock()
            .stations
            .get(self.station)
            .map(|s| s.address)
            .unwrap_or_default()
    }

    /// Frames waiting in this radio's receive FIFO.
    pub fn pending(&self) -> usize {
        self.ether
            .lock()
            .stations
            .get(self.station)
            .map(|s| s.fifo.len())
            .unwrap_or_default()
    }

    /// Place raw bytes directly into this radio's FIFO, bypassing the medium.
    pub fn inject(&self, bytes: impl Into<Bytes>, rssi: i16) {
        if let Some(station) = self.ether.lock().stations.get_mut(self.station) {
            station.fifo.push_back(RawReception {
                bytes: bytes.into(),
                rssi,
            });
        }
    }
}

impl Transceiver for SimRadio {
    fn init(&mut self) -> Result<()> {
        if let Some(reason) = &self.init_failure {
            return Err(RadioError::Init(reason.clone()));
        }
        self.mode = Mode::Idle;
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if self.mode != mode {
            trace!(station = self.station, %mode, "mode change");
        }
        self.mode = mode;
        Ok(())
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn frame_ready(&mut self) -> Result<bool> {
        if self.mode != Mode::Receive {
            return Ok(false);
        }
        let state = self.ether.lock();
        match state.stations.get(self.station) {
            Some(station) if station.attached => Ok(!station.fifo.is_empty()),
            _ => Err(RadioError::Shutdown),
        }
    }

    fn receive_raw(&mut self) -> Result<Option<RawReception>> {
        let received = {
            let mut state = self.ether.lock();
            match state.stations.get_mut(self.station) {
                Some(station) if station.attached => station.fifo.pop_front(),
                _ => return Err(RadioError::Shutdown),
            }
        };
        self.mode = Mode::Idle;
        Ok(received)
    }

    fn transmit_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.mode = Mode::Transmit;
        let result = self.ether.broadcast(self.station, bytes);
        self.mode = Mode::Idle;
        result
    }

    fn set_address(&mut self, address: u8, promiscuous: bool) -> Result<()> {
        let mut state = self.ether.lock();
        let station = state
            .stations
            .get_mut(self.station)
            .ok_or(RadioError::Shutdown)?;
        station.address = address;
        self.promiscuous = promiscuous;
        debug!(station = self.station, address, promiscuous, "address configured");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sim-ether"
    }
}

impl Drop for SimRadio {
    fn drop(&mut self) {
        if let Some(station) = self.ether.lock().stations.get_mut(self.station) {
            station.attached = false;
            station.fifo.clear();
        }
    }
}

impl std::fmt::Debug for SimRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRadio")
            .field("station", &self.station)
            .field("mode", &self.mode)
            .field("promiscuous", &self.promiscuous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(ether: &Ether) -> (SimRadio, SimRadio) {
        let mut a = ether.attach();
        let mut b = ether.attach();
        a.set_address(1, false).unwrap();
        b.set_address(2, false).unwrap();
        b.set_mode(Mode::Receive).unwrap();
        (a, b)
    }

    #[test]
    fn transmission_reaches_other_station() {
        let ether = Ether::new();
        let (mut a, mut b) = pair(&ether);

        a.transmit_raw(b"hello").unwrap();
        assert_eq!(a.mode(), Mode::Idle);
        assert!(b.frame_ready().unwrap());

        let rx = b.receive_raw().unwrap().unwrap();
        assert_eq!(rx.bytes.as_ref(), b"hello");
        assert_eq!(rx.rssi, -40);
        assert_eq!(b.mode(), Mode::Idle);
    }

    #[test]
    fn sender_does_not_hear_itself() {
        let ether = Ether::new();
        let (mut a, _b) = pair(&ether);
        a.set_mode(Mode::Receive).unwrap();
        a.transmit_raw(b"echo?").unwrap();
        a.set_mode(Mode::Receive).unwrap();
        assert!(!a.frame_ready().unwrap());
    }

    #[test]
    fn frame_ready_only_in_receive_mode() {
        let ether = Ether::new();
        let (mut a, mut b) = pair(&ether);
        b.set_mode(Mode::Idle).unwrap();

        a.transmit_raw(b"x").unwrap();
        assert!(!b.frame_ready().unwrap());
        b.set_mode(Mode::Receive).unwrap();
        assert!(b.frame_ready().unwrap());
    }

    #[test]
    fn periodic_drop_is_deterministic() {
        let ether = Ether::with_config(EtherConfig {
            faults: FaultPlan {
                drop_every: Some(2),
                ..FaultPlan::default()
            },
            ..EtherConfig::default()
        });
        let (mut a, b) = pair(&ether);

        for _ in 0..4 {
            a.transmit_raw(b"tick").unwrap();
        }
        assert_eq!(b.pending(), 2);
        let stats = ether.stats();
        assert_eq!(stats.transmissions, 4);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn corruption_flips_trailer_bit() {
        let ether = Ether::with_config(EtherConfig {
            faults: FaultPlan {
                corrupt_every: Some(1),
                ..FaultPlan::default()
            },
            ..EtherConfig::default()
        });
        let (mut a, mut b) = pair(&ether);

        a.transmit_raw(&[0x10, 0x20, 0x30]).unwrap();
        b.set_mode(Mode::Receive).unwrap();
        let rx = b.receive_raw().unwrap().unwrap();
        assert_eq!(rx.bytes.as_ref(), &[0x10, 0x20, 0x31]);
        assert_eq!(ether.stats().corrupted, 1);
    }

    #[test]
    fn severed_link_blocks_both_directions() {
        let ether = Ether::new();
        let (mut a, mut b) = pair(&ether);
        ether.set_severed(1, 2, true);

        a.transmit_raw(b"lost").unwrap();
        b.transmit_raw(b"lost").unwrap();
        assert_eq!(b.pending(), 0);
        assert_eq!(a.pending(), 0);

        ether.set_severed(2, 1, false);
        a.transmit_raw(b"back").unwrap();
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn fifo_overflow_is_counted() {
        let ether = Ether::with_config(EtherConfig {
            rx_capacity: 1,
            ..EtherConfig::default()
        });
        let (mut a, b) = pair(&ether);

        a.transmit_raw(b"one").unwrap();
        a.transmit_raw(b"two").unwrap();
        assert_eq!(b.pending(), 1);
        assert_eq!(ether.stats().overflowed, 1);
    }

    #[test]
    fn link_rssi_overrides_default() {
        let ether = Ether::new();
        let (mut a, mut b) = pair(&ether);
        ether.set_link_rssi(1, 2, -97);

        a.transmit_raw(b"far").unwrap();
        let rx = b.receive_raw().unwrap().unwrap();
        assert_eq!(rx.rssi, -97);
    }

    #[test]
    fn scheduled_drops_consume_before_delivery() {
        let ether = Ether::new();
        let (mut a, b) = pair(&ether);
        ether.drop_next(1);

        a.transmit_raw(b"first").unwrap();
        a.transmit_raw(b"second").unwrap();
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn init_failure_is_reported() {
        let ether = Ether::new();
        let mut radio = ether.attach().with_init_failure("no module on bus");
        let err = radio.init().unwrap_err();
        assert!(matches!(err, RadioError::Init(_)));
        assert!(err.to_string().contains("no module on bus"));
    }

    #[test]
    fn dropped_radio_leaves_medium() {
        let ether = Ether::new();
        let (mut a, b) = pair(&ether);
        drop(b);

        a.transmit_raw(b"anyone?").unwrap();
        assert_eq!(ether.stats().delivered, 0);
    }
}
