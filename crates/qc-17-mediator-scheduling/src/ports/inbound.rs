//! Inbound ports (driving side - API)

use crate::domain::{DynamicGlobalProperty, GlobalProperty, Mediator, MediatorStats};
use crate::error::Result;
use std::sync::Arc;

/// Primary port: read-only view of scheduling state for monitoring and tooling.
///
/// Every call reads one consistent snapshot; a concurrent unit commit is
/// observed either entirely or not at all.
pub trait SchedulingQuery: Send + Sync {
    /// Snapshot of the current committee
    fn global_property(&self) -> GlobalProperty;

    /// Snapshot of the tip bookkeeping
    fn dynamic_global_property(&self) -> DynamicGlobalProperty;

    /// Mediator scheduled for the `slot_num`-th slot after the tip
    fn scheduled_mediator(&self, slot_num: u32) -> Result<Arc<Mediator>>;

    /// Start time of the `slot_num`-th slot after the tip
    fn slot_time(&self, slot_num: u32) -> u64;

    /// Last slot starting at or before `when`
    fn slot_at_time(&self, when: u64) -> u32;

    /// Production statistics for one mediator
    fn mediator_stats(&self, name: &str) -> MediatorStats;

    /// Share of the last 128 slots that were filled
    fn participation_rate(&self) -> f64;

    /// Whether the next production opportunity is at or after `now`
    fn is_synced(&self, now: u64) -> bool;
}
