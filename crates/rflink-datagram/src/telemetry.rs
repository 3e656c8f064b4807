//! Link counters kept by each [`Manager`](crate::Manager).
//!
//! Counters only ever increase. They are read through snapshots and never
//! influence protocol decisions.

use std::collections::BTreeMap;

use rflink_frame::DecodeErrorKind;
use serde::Serialize;

/// Frames rejected by the codec, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounters {
    pub invalid_sync: u64,
    pub length_mismatch: u64,
    pub crc_mismatch: u64,
}

impl DropCounters {
    pub fn total(&self) -> u64 {
        self.invalid_sync + self.length_mismatch + self.crc_mismatch
    }

    fn record(&mut self, kind: DecodeErrorKind) {
        match kind {
            DecodeErrorKind::InvalidSync => self.invalid_sync += 1,
            DecodeErrorKind::LengthMismatch => self.length_mismatch += 1,
            DecodeErrorKind::CrcMismatch => self.crc_mismatch += 1,
        }
    }
}

/// Snapshot of one node's link activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkTelemetry {
    /// Data frames handed to the application.
    pub delivered: u64,
    /// Data frames recognised as retransmissions of the last accepted id.
    pub duplicates: u64,
    /// Frames that failed to decode.
    pub dropped: DropCounters,
    /// Valid frames addressed to another node.
    pub filtered: u64,
    /// Data frames transmitted, retransmissions included.
    pub data_sent: u64,
    pub acks_sent: u64,
    /// Acknowledgments that resolved a pending send.
    pub acks_received: u64,
    pub unmatched_acks: u64,
    /// Retransmissions after an acknowledgment timeout.
    pub retries: u64,
    /// Reliable sends that ran out of attempts.
    pub failed: u64,
    /// Deliveries lost because the application queue was full.
    pub delivery_overflow: u64,
    /// Signal strength of the last accepted frame from each sender, in dBm.
    pub last_rssi: BTreeMap<u8, i16>,
}

impl LinkTelemetry {
    pub(crate) fn record_drop(&mut self, kind: DecodeErrorKind) {
        self.dropped.record(kind);
    }

    pub(crate) fn record_rssi(&mut self, from: u8, rssi: i16) {
        self.last_rssi.insert(from, rssi);
    }
}
