//! Scheduling state aggregate
//!
//! `ChainState` bundles everything slot decisions depend on: the committee,
//! the dynamic tip bookkeeping, the round schedule and per-mediator
//! statistics. It is mutated only through [`ChainState::update_global_dyn_prop`]
//! (unit commit) and [`ChainState::apply_maintenance`] (committee change).

use super::entities::{
    DynamicGlobalProperty, GlobalProperty, Mediator, MediatorStats, VerifiedUnit,
};
use super::invariants::check_all_invariants;
use super::participation::{participation_rate, record_production};
use super::schedule::MediatorSchedule;
use super::slot_time::{get_slot_at_time, get_slot_time, is_synced};
use crate::error::{Result, SchedulingError};
use parking_lot::RwLock;
use primitive_types::H256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Scheduling state shared between the production loop and query readers
pub type SharedChainState = Arc<RwLock<ChainState>>;

/// Result of committing a unit to chain state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitSummary {
    /// Slots skipped between the previous tip and this unit
    pub missed_units: u64,

    /// Absolute slot after the commit
    pub absolute_slot: u64,

    /// Whether the commit crossed a round boundary and reshuffled
    pub reshuffled: bool,
}

/// Committee, tip bookkeeping and round schedule of one node
#[derive(Clone, Debug)]
pub struct ChainState {
    global: GlobalProperty,
    dynamic: DynamicGlobalProperty,
    schedule: MediatorSchedule,
    mediator_stats: HashMap<String, MediatorStats>,
}

impl ChainState {
    /// State of a brand new chain starting at `genesis_time`
    pub fn genesis(global: GlobalProperty, genesis_time: u64, genesis_hash: H256) -> Self {
        let dynamic = DynamicGlobalProperty::genesis(genesis_time, genesis_hash);
        let schedule = MediatorSchedule::initialize(&global, &dynamic);
        info!(
            "[qc-17] Genesis state: {} mediators, interval {}s, genesis time {}",
            global.active_count(),
            global.chain_parameters().interval(),
            genesis_time
        );
        Self {
            global,
            dynamic,
            schedule,
            mediator_stats: HashMap::new(),
        }
    }

    /// Rebuild state from a persisted tip
    pub fn from_parts(
        global: GlobalProperty,
        dynamic: DynamicGlobalProperty,
        schedule: MediatorSchedule,
        mediator_stats: HashMap<String, MediatorStats>,
    ) -> Result<Self> {
        if schedule.shuffled_mediators().is_empty() {
            return Err(SchedulingError::EmptySchedule);
        }
        Ok(Self {
            global,
            dynamic,
            schedule,
            mediator_stats,
        })
    }

    /// Wrap into the shared, lock-protected form
    pub fn into_shared(self) -> SharedChainState {
        Arc::new(RwLock::new(self))
    }

    /// Current committee
    pub fn global_property(&self) -> &GlobalProperty {
        &self.global
    }

    /// Current tip bookkeeping
    pub fn dynamic_global_property(&self) -> &DynamicGlobalProperty {
        &self.dynamic
    }

    /// Current round schedule
    pub fn schedule(&self) -> &MediatorSchedule {
        &self.schedule
    }

    /// Start time of the `slot_num`-th slot after the tip
    pub fn slot_time(&self, slot_num: u32) -> u64 {
        get_slot_time(&self.global, &self.dynamic, slot_num)
    }

    /// Last slot starting at or before `when`
    pub fn slot_at_time(&self, when: u64) -> u32 {
        get_slot_at_time(&self.global, &self.dynamic, when)
    }

    /// Mediator entitled to produce in the `slot_num`-th slot after the tip
    pub fn scheduled_mediator(&self, slot_num: u32) -> Result<Arc<Mediator>> {
        self.schedule
            .get_scheduled_mediator(&self.dynamic, slot_num)
            .cloned()
    }

    /// Whether the next production opportunity is at or after `now`
    pub fn is_synced(&self, now: u64) -> bool {
        is_synced(&self.global, &self.dynamic, now)
    }

    /// Share of the last 128 slots that were filled
    pub fn participation_rate(&self) -> f64 {
        participation_rate(self.dynamic.recent_slots_filled)
    }

    /// Production statistics for one mediator
    pub fn mediator_stats(&self, name: &str) -> MediatorStats {
        self.mediator_stats.get(name).cloned().unwrap_or_default()
    }

    /// Statistics of every mediator that has produced or missed a slot
    pub fn all_mediator_stats(&self) -> &HashMap<String, MediatorStats> {
        &self.mediator_stats
    }

    /// Replace the committee at a maintenance boundary.
    ///
    /// The current round keeps its order; the next reshuffle uses the new set.
    pub fn apply_maintenance(&mut self, global: GlobalProperty) {
        info!(
            "[qc-17] Maintenance: committee {} -> {} mediators",
            self.global.active_count(),
            global.active_count()
        );
        self.global = global;
    }

    /// Whether `name` produced the tip unit and no reshuffle happened since.
    pub fn is_consecutive_mediator(&self, name: &str) -> bool {
        !self.dynamic.is_shuffled_schedule
            && self
                .dynamic
                .current_mediator
                .as_ref()
                .is_some_and(|m| m.name == name)
    }

    /// Check that `unit` could be committed right now without changing state.
    /// Returns the producing mediator.
    pub fn validate_unit(&self, unit: &VerifiedUnit) -> Result<Arc<Mediator>> {
        check_all_invariants(&self.dynamic, unit)?;

        self.global
            .active_mediator(&unit.mediator)
            .cloned()
            .ok_or_else(|| {
                SchedulingError::InvariantViolation(format!(
                    "unit #{} produced by inactive mediator {}",
                    unit.unit_num, unit.mediator
                ))
            })
    }

    /// Commit a freshly produced unit.
    ///
    /// Missed slots are derived from the state *before* the unit is applied,
    /// then the tip, absolute slot and participation window advance together
    /// and the schedule is reshuffled if a round boundary was reached.
    pub fn update_global_dyn_prop(&mut self, unit: &VerifiedUnit) -> Result<CommitSummary> {
        let producer = self.validate_unit(unit)?;

        let missed_units = u64::from(self.slot_at_time(unit.timestamp).saturating_sub(1));
        if missed_units > 0 {
            debug!("[qc-17] Unit #{} missed {} slots", unit.unit_num, missed_units);
        }
        self.record_missed_units(missed_units)?;

        let dynamic = &mut self.dynamic;
        dynamic.current_absolute_slot += missed_units + 1;
        dynamic.recent_slots_filled = record_production(dynamic.recent_slots_filled, missed_units);
        dynamic.last_unit_num = unit.unit_num;
        dynamic.last_unit_hash = unit.hash();
        dynamic.last_unit_time = unit.timestamp;
        dynamic.current_mediator = Some(Arc::clone(&producer));

        let stats = self.mediator_stats.entry(producer.name.clone()).or_default();
        stats.total_produced += 1;
        stats.last_confirmed_unit_num = unit.unit_num;

        let reshuffled = self.schedule.update(&self.global, &self.dynamic);
        self.dynamic.is_shuffled_schedule = reshuffled;

        Ok(CommitSummary {
            missed_units,
            absolute_slot: self.dynamic.current_absolute_slot,
            reshuffled,
        })
    }

    /// Charge a miss to every mediator scheduled in the skipped slots.
    ///
    /// Gaps of a full round or more are not attributed: everyone missed.
    fn record_missed_units(&mut self, missed_units: u64) -> Result<()> {
        if missed_units >= self.global.active_count() as u64 {
            return Ok(());
        }

        for slot in 1..=missed_units as u32 {
            let mediator = self.scheduled_mediator(slot)?;
            self.mediator_stats
                .entry(mediator.name.clone())
                .or_default()
                .total_missed += 1;
        }
        Ok(())
    }
}
