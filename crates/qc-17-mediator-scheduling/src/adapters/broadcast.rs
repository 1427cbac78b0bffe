//! Broadcast channel publisher
//!
//! Fans produced units out to in-process subscribers (the network layer, a
//! monitoring sink) over `tokio::sync::broadcast`.

use crate::domain::VerifiedUnit;
use crate::error::Result;
use crate::events::UnitProducedEvent;
use crate::ports::UnitBroadcaster;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Unit broadcaster backed by a tokio broadcast channel
pub struct BroadcastChannelPublisher {
    sender: broadcast::Sender<UnitProducedEvent>,
    units_published: AtomicU64,
}

impl BroadcastChannelPublisher {
    /// Publisher with the default channel capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Publisher buffering up to `capacity` events per slow subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            units_published: AtomicU64::new(0),
        }
    }

    /// Subscribe to produced units
    pub fn subscribe(&self) -> broadcast::Receiver<UnitProducedEvent> {
        self.sender.subscribe()
    }

    /// Total units published
    pub fn units_published(&self) -> u64 {
        self.units_published.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastChannelPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitBroadcaster for BroadcastChannelPublisher {
    async fn publish(&self, unit: VerifiedUnit) -> Result<()> {
        let unit_num = unit.unit_num;
        self.units_published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is not a failure; delivery is the network's concern
        match self.sender.send(UnitProducedEvent::new(unit)) {
            Ok(receivers) => debug!("[qc-17] Unit #{} sent to {} subscribers", unit_num, receivers),
            Err(_) => debug!("[qc-17] Unit #{} published with no subscribers", unit_num),
        }
        Ok(())
    }
}
