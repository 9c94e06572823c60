//! Broadcast Hub
//!
//! Single-producer, multi-consumer fan-out of sensor readings. Each
//! subscriber registers its own unbounded channel, so a consumer that stops
//! draining never stalls the publisher or its siblings. Readings published
//! while no channel is registered are dropped: this is a live stream, not a
//! log.

use co2_feed::Reading;
use metrics::counter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Sending half of a subscriber's delivery channel
pub type ReadingSender = mpsc::UnboundedSender<Reading>;

/// Handle identifying a registered channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

/// Fan-out point between the reading source and the evaluators
#[derive(Debug, Default)]
pub struct BroadcastHub {
    channels: RwLock<HashMap<ChannelId, ReadingSender>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel to the fan-out set
    pub fn register(&self, sender: ReadingSender) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().insert(id, sender);
        debug!("Registered hub channel {:?}", id);
        id
    }

    /// Remove a channel; dropping its sender closes the subscriber's queue
    pub fn unregister(&self, id: ChannelId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            debug!("Unregistered hub channel {:?}", id);
        }
        removed
    }

    /// Deliver a reading to every registered channel.
    ///
    /// Returns the number of channels reached. Channels whose receiver is
    /// gone are pruned.
    pub fn publish(&self, reading: Reading) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, sender) in self.read().iter() {
            match sender.send(reading) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(*id),
            }
        }

        if !closed.is_empty() {
            let mut channels = self.write();
            for id in &closed {
                channels.remove(id);
            }
            debug!("Pruned {} closed hub channel(s)", closed.len());
        }

        if delivered == 0 {
            trace!("Reading #{} dropped: no subscribers", reading.seq);
            counter!("co2_readings_unobserved_total").increment(1);
        }

        delivered
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChannelId, ReadingSender>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChannelId, ReadingSender>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }
}
