use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use rflink_frame::{
    decode_frame, encode_frame, AddressFilter, DecodeErrorKind, Frame, FrameError, Header,
    BROADCAST, NO_ACK_NEEDED, RETRY,
};
use rflink_radio::{Mode, RawReception, Transceiver};
use tracing::{debug, info, trace, warn};

use crate::config::DatagramConfig;
use crate::delivery::{Delivery, DeliverySender, DeliverySink};
use crate::error::Result;
use crate::telemetry::LinkTelemetry;

/// Cooperative stop flag for [`Manager::run`].
///
/// Clones share the same flag, so one can be handed to a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the loop exit at its next iteration.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for APIs that want an `Arc<AtomicBool>`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl From<Arc<AtomicBool>> for StopHandle {
    fn from(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }
}

/// What a single [`Manager::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// No frame was ready.
    Idle,
    /// A new data frame was queued for the application.
    Delivered { from: u8, id: u8 },
    /// A retransmission of the last accepted frame from this sender.
    Duplicate { from: u8, id: u8 },
    /// The delivery queue was full; the frame was dropped unacknowledged.
    Overflowed { from: u8, id: u8 },
    /// An acknowledgment resolved the pending send.
    AckMatched { from: u8, id: u8 },
    /// An acknowledgment that matched nothing.
    AckIgnored { from: u8, id: u8 },
    /// The received bytes did not decode.
    Dropped(DecodeErrorKind),
    /// A valid frame for another node.
    Filtered { to: u8 },
}

/// Result of a reliable send. Failure is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The destination acknowledged the datagram.
    Acked {
        id: u8,
        attempts: u32,
        elapsed: Duration,
    },
    /// Every attempt timed out.
    Failed {
        id: u8,
        attempts: u32,
        elapsed: Duration,
    },
    /// Sent once to every node; broadcasts are never acknowledged.
    Broadcast { id: u8 },
}

impl SendOutcome {
    pub fn is_acked(&self) -> bool {
        matches!(self, SendOutcome::Acked { .. })
    }

    pub fn id(&self) -> u8 {
        match self {
            SendOutcome::Acked { id, .. }
            | SendOutcome::Failed { id, .. }
            | SendOutcome::Broadcast { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSend {
    to: u8,
    id: u8,
    acked: bool,
}

/// Reliable addressed datagrams over one half-duplex transceiver.
///
/// The manager owns the radio. Every inbound frame goes through the same
/// path whether it arrives during [`run`](Manager::run),
/// [`recv_timeout`](Manager::recv_timeout) or while a reliable send waits for
/// its acknowledgment: decode, address filter, then ACK resolution or
/// duplicate suppression and delivery.
pub struct Manager<T: Transceiver> {
    radio: T,
    config: DatagramConfig,
    filter: AddressFilter,
    next_id: u8,
    /// Last accepted id per sender.
    last_accepted: [Option<u8>; 256],
    pending: Option<PendingSend>,
    deliveries: DeliverySink,
    telemetry: LinkTelemetry,
    buf: BytesMut,
}

impl<T: Transceiver> Manager<T> {
    /// Bring up the radio and start listening.
    ///
    /// A transceiver init failure is returned as-is; there is nothing to
    /// retry at this layer.
    pub fn new(mut radio: T, config: DatagramConfig) -> Result<Self> {
        config.validate()?;

        if let Err(err) = radio.init() {
            warn!(radio = radio.name(), error = %err, "transceiver init failed");
            return Err(err.into());
        }
        radio.set_address(config.address, config.promiscuous)?;
        radio.set_mode(Mode::Receive)?;

        info!(
            radio = radio.name(),
            address = config.address,
            promiscuous = config.promiscuous,
            "datagram node up"
        );

        Ok(Self {
            radio,
            filter: AddressFilter::new(config.address, config.promiscuous),
            next_id: 0,
            last_accepted: [None; 256],
            pending: None,
            deliveries: DeliverySink::local(config.delivery_capacity),
            telemetry: LinkTelemetry::default(),
            buf: BytesMut::with_capacity(64),
            config,
        })
    }

    /// Hand deliveries to a bounded channel instead of the local queue.
    pub fn with_delivery_sender(mut self, sender: DeliverySender) -> Self {
        self.deliveries = DeliverySink::Channel(sender);
        self
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn config(&self) -> &DatagramConfig {
        &self.config
    }

    pub fn radio(&self) -> &T {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut T {
        &mut self.radio
    }

    pub fn into_radio(self) -> T {
        self.radio
    }

    /// Current counters.
    pub fn telemetry(&self) -> &LinkTelemetry {
        &self.telemetry
    }

    /// Deliveries waiting in the local queue.
    pub fn queued(&self) -> usize {
        self.deliveries.len()
    }

    /// Send with acknowledgment using the configured retry policy.
    pub fn send_reliable(&mut self, to: u8, payload: &[u8]) -> Result<SendOutcome> {
        let attempts = self.config.attempts();
        let timeout = self.config.ack_timeout;
        self.send_reliable_with(to, payload, attempts, timeout)
    }

    /// Send with acknowledgment.
    ///
    /// `max_retries` is the total number of transmissions (at least one).
    /// Inbound frames keep being processed while waiting.
    pub fn send_reliable_with(
        &mut self,
        to: u8,
        payload: &[u8],
        max_retries: u32,
        ack_timeout: Duration,
    ) -> Result<SendOutcome> {
        self.check_payload(payload)?;
        let id = self.allocate_id();

        if to == BROADCAST {
            self.send_data(Header::new(BROADCAST, self.address(), id, NO_ACK_NEEDED), payload)?;
            debug!(id, len = payload.len(), "broadcast sent without acknowledgment");
            return Ok(SendOutcome::Broadcast { id });
        }

        self.pending = Some(PendingSend {
            to,
            id,
            acked: false,
        });
        let outcome = self.await_ack(to, id, payload, max_retries.max(1), ack_timeout);
        self.pending = None;

        match &outcome {
            Ok(SendOutcome::Acked {
                attempts, elapsed, ..
            }) => {
                debug!(
                    to,
                    id,
                    attempts = *attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "datagram acknowledged"
                );
            }
            Ok(SendOutcome::Failed { attempts, .. }) => {
                self.telemetry.failed += 1;
                warn!(to, id, attempts = *attempts, "no acknowledgment, giving up");
            }
            _ => {}
        }
        outcome
    }

    /// Send once without requesting an acknowledgment. Returns the frame id.
    pub fn send_unreliable(&mut self, to: u8, payload: &[u8]) -> Result<u8> {
        self.check_payload(payload)?;
        let id = self.allocate_id();
        self.send_data(Header::new(to, self.address(), id, NO_ACK_NEEDED), payload)?;
        debug!(to, id, len = payload.len(), "datagram sent without acknowledgment");
        Ok(id)
    }

    /// Process at most one received frame.
    pub fn poll(&mut self) -> Result<PollEvent> {
        if self.radio.mode() != Mode::Receive {
            self.radio.set_mode(Mode::Receive)?;
        }
        if !self.radio.frame_ready()? {
            return Ok(PollEvent::Idle);
        }

        let event = match self.radio.receive_raw() {
            Ok(Some(reception)) => self.handle(reception),
            Ok(None) => Ok(PollEvent::Idle),
            Err(err) => Err(err.into()),
        };
        let restored = self.radio.set_mode(Mode::Receive);
        let event = event?;
        restored?;
        Ok(event)
    }

    /// Pop the oldest queued delivery without touching the radio.
    pub fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.pop()
    }

    /// Poll until a delivery is queued or `timeout` elapses.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(delivery) = self.deliveries.pop() {
                return Ok(Some(delivery));
            }
            let Some(remaining) = remaining(deadline) else {
                return Ok(None);
            };
            if self.poll()? == PollEvent::Idle {
                thread::sleep(self.config.poll_interval.min(remaining));
            }
        }
    }

    /// Poll until `stop` is set. The radio is left idle however this returns.
    pub fn run(&mut self, stop: &StopHandle) -> Result<()> {
        info!(address = self.address(), "receive loop started");
        let mut guard = IdleOnExit { manager: self };

        while !stop.is_stopped() {
            if guard.manager.poll()? == PollEvent::Idle {
                thread::sleep(guard.manager.config.poll_interval);
            }
        }

        info!(
            address = guard.manager.address(),
            delivered = guard.manager.telemetry.delivered,
            "receive loop stopped"
        );
        Ok(())
    }

    fn await_ack(
        &mut self,
        to: u8,
        id: u8,
        payload: &[u8],
        attempts: u32,
        ack_timeout: Duration,
    ) -> Result<SendOutcome> {
        let started = Instant::now();

        for attempt in 1..=attempts {
            let flags = if attempt == 1 {
                0
            } else {
                self.telemetry.retries += 1;
                RETRY
            };
            trace!(to, id, attempt, "transmitting datagram");
            self.send_data(Header::new(to, self.address(), id, flags), payload)?;

            let deadline = Instant::now().checked_add(ack_timeout);
            loop {
                if self.pending.is_some_and(|p| p.acked) {
                    return Ok(SendOutcome::Acked {
                        id,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                let Some(remaining) = remaining(deadline) else {
                    break;
                };
                if self.poll()? == PollEvent::Idle {
                    thread::sleep(self.config.poll_interval.min(remaining));
                }
            }
            debug!(to, id, attempt, "ack timeout");
        }

        Ok(SendOutcome::Failed {
            id,
            attempts,
            elapsed: started.elapsed(),
        })
    }

    fn handle(&mut self, reception: RawReception) -> Result<PollEvent> {
        let frame = match decode_frame(&reception.bytes, &self.config.frame) {
            Ok(frame) => frame,
            Err(err) => {
                self.telemetry.record_drop(err.kind());
                debug!(error = %err, rssi = reception.rssi, len = reception.bytes.len(), "frame dropped");
                return Ok(PollEvent::Dropped(err.kind()));
            }
        };

        let header = frame.header;
        if !self.filter.accepts(&header) {
            self.telemetry.filtered += 1;
            trace!(to = header.to, from = header.from, id = header.id, "frame for another node");
            return Ok(PollEvent::Filtered { to: header.to });
        }
        self.telemetry.record_rssi(header.from, reception.rssi);

        if header.is_ack() {
            return Ok(self.handle_ack(&header));
        }
        self.handle_data(frame, reception.rssi)
    }

    fn handle_ack(&mut self, header: &Header) -> PollEvent {
        let (from, id) = (header.from, header.id);
        let matched = self.filter.is_local(header)
            && match self.pending.as_mut() {
                Some(pending) if !pending.acked && pending.to == from && pending.id == id => {
                    pending.acked = true;
                    true
                }
                _ => false,
            };

        if matched {
            self.telemetry.acks_received += 1;
            trace!(from, id, "ack matched pending send");
            PollEvent::AckMatched { from, id }
        } else {
            self.telemetry.unmatched_acks += 1;
            trace!(from, id, to = header.to, "ack ignored");
            PollEvent::AckIgnored { from, id }
        }
    }

    fn handle_data(&mut self, frame: Frame, rssi: i16) -> Result<PollEvent> {
        let header = frame.header;
        let (from, id) = (header.from, header.id);
        let ack = self.filter.is_local(&header) && header.wants_ack();

        if self.last_accepted[from as usize] == Some(id) {
            self.telemetry.duplicates += 1;
            debug!(from, id, retry = header.flags & RETRY != 0, "duplicate suppressed");
            if ack {
                self.send_ack(&header)?;
            }
            return Ok(PollEvent::Duplicate { from, id });
        }

        let len = frame.payload.len();
        let delivery = Delivery {
            from,
            to: header.to,
            id,
            flags: header.flags,
            payload: frame.payload,
            rssi,
        };
        if let Err(reason) = self.deliveries.push(delivery) {
            self.telemetry.delivery_overflow += 1;
            warn!(from, id, ?reason, "delivery queue unavailable, datagram dropped");
            return Ok(PollEvent::Overflowed { from, id });
        }

        self.last_accepted[from as usize] = Some(id);
        self.telemetry.delivered += 1;
        debug!(from, to = header.to, id, len, rssi, "datagram delivered");
        if ack {
            self.send_ack(&header)?;
        }
        Ok(PollEvent::Delivered { from, id })
    }

    fn send_ack(&mut self, data: &Header) -> Result<()> {
        let ack = Frame::ack_for(data, self.address());
        self.transmit(&ack.header, &[])?;
        self.telemetry.acks_sent += 1;
        trace!(to = data.from, id = data.id, "ack sent");
        Ok(())
    }

    fn send_data(&mut self, header: Header, payload: &[u8]) -> Result<()> {
        self.transmit(&header, payload)?;
        self.telemetry.data_sent += 1;
        Ok(())
    }

    /// Encode and transmit one frame, then return to receive mode.
    fn transmit(&mut self, header: &Header, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(header, payload, &self.config.frame, &mut self.buf)?;

        self.radio.set_mode(Mode::Transmit)?;
        let sent = self.radio.transmit_raw(&self.buf);
        let restored = self.radio.set_mode(Mode::Receive);
        sent?;
        restored?;
        Ok(())
    }

    fn check_payload(&self, payload: &[u8]) -> Result<()> {
        let max = self.config.frame.max_payload;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            }
            .into());
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> u8 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

/// Puts the radio into idle when a receive loop exits.
struct IdleOnExit<'a, T: Transceiver> {
    manager: &'a mut Manager<T>,
}

impl<T: Transceiver> Drop for IdleOnExit<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.radio.set_mode(Mode::Idle) {
            warn!(error = %err, "failed to idle radio on loop exit");
        }
    }
}

/// Time left until `deadline`, or `None` once it has passed. A missing
/// deadline (timeout beyond the clock's range) never expires.
fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let left = deadline.saturating_duration_since(Instant::now());
            (!left.is_zero()).then_some(left)
        }
        None => Some(Duration::MAX),
    }
}
