//! Outbound ports (driven side - SPI)
//!
//! Key custody, unit storage, broadcast and wall-clock access are owned by
//! other subsystems. The producer reaches them only through these traits and
//! bounds every async call with a timeout, so a slow collaborator costs one
//! slot rather than stalling the production loop.

use crate::domain::{ChainState, DynamicGlobalProperty, Mediator, MediatorStats, VerifiedUnit};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Port: Mediator signing keys (key custody)
#[async_trait]
pub trait UnitSigner: Send + Sync {
    /// Whether the signing key for `mediator` is available on this node
    fn can_sign(&self, mediator: &Mediator) -> bool;

    /// Sign a unit payload with the key of `mediator`
    async fn sign(&self, mediator: &Mediator, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Port: Persist produced units and recover the tip on restart
#[async_trait]
pub trait UnitStorage: Send + Sync {
    /// Append a unit to the chain
    async fn append_unit(&self, unit: VerifiedUnit) -> Result<()>;

    /// Load the persisted tip, `None` for an empty chain
    async fn load_tip(&self) -> Result<Option<ChainTip>>;
}

/// Port: Hand produced units to the network layer
#[async_trait]
pub trait UnitBroadcaster: Send + Sync {
    /// Publish a unit. Delivery is the network layer's concern.
    async fn publish(&self, unit: VerifiedUnit) -> Result<()>;
}

/// Persisted scheduling state at the chain tip
#[derive(Clone, Debug)]
pub struct ChainTip {
    /// Dynamic bookkeeping as of the tip unit
    pub dynamic: DynamicGlobalProperty,

    /// Round order in effect at the tip
    pub shuffled_mediators: Vec<Arc<Mediator>>,

    /// Produced and missed counters, keyed by mediator name
    pub mediator_stats: HashMap<String, MediatorStats>,
}

impl ChainTip {
    /// Capture everything needed to resume from `state`
    pub fn from_state(state: &ChainState) -> Self {
        Self {
            dynamic: state.dynamic_global_property().clone(),
            shuffled_mediators: state.schedule().shuffled_mediators().to_vec(),
            mediator_stats: state.all_mediator_stats().clone(),
        }
    }
}

/// Time source for slot decisions
pub trait TimeSource: Send + Sync {
    /// Current unix time in milliseconds
    fn now_millis(&self) -> u64;

    /// Current unix time rounded to the nearest second
    fn now_rounded_secs(&self) -> u64 {
        (self.now_millis() + 500) / 1_000
    }
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
