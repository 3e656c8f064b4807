use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use bytes::Bytes;

/// A data frame accepted for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: u8,
    pub to: u8,
    pub id: u8,
    pub flags: u8,
    pub payload: Bytes,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl Delivery {
    /// True when the frame was addressed to every node.
    pub fn is_broadcast(&self) -> bool {
        rflink_frame::flags::is_broadcast(self.to)
    }
}

/// Sending half of a bounded delivery handoff, attached to a
/// [`Manager`](crate::Manager).
#[derive(Debug, Clone)]
pub struct DeliverySender {
    tx: SyncSender<Delivery>,
}

/// Create a bounded channel for handing deliveries to another thread.
///
/// The manager never blocks on it: a full or disconnected channel drops the
/// delivery and counts it as overflow.
pub fn delivery_channel(capacity: usize) -> (DeliverySender, Receiver<Delivery>) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (DeliverySender { tx }, rx)
}

/// Why a delivery could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejected {
    Full,
    Disconnected,
}

#[derive(Debug)]
pub(crate) enum DeliverySink {
    Local {
        queue: VecDeque<Delivery>,
        capacity: usize,
    },
    Channel(DeliverySender),
}

impl DeliverySink {
    pub(crate) fn local(capacity: usize) -> Self {
        DeliverySink::Local {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, delivery: Delivery) -> std::result::Result<(), Rejected> {
        match self {
            DeliverySink::Local { queue, capacity } => {
                if queue.len() >= *capacity {
                    return Err(Rejected::Full);
                }
                queue.push_back(delivery);
                Ok(())
            }
            DeliverySink::Channel(sender) => match sender.tx.try_send(delivery) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(Rejected::Full),
                Err(TrySendError::Disconnected(_)) => Err(Rejected::Disconnected),
            },
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Delivery> {
        match self {
            DeliverySink::Local { queue, .. } => queue.pop_front(),
            DeliverySink::Channel(_) => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            DeliverySink::Local { queue, .. } => queue.len(),
            DeliverySink::Channel(_) => 0,
        }
    }
}
