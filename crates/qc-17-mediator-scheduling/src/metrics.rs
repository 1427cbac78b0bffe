//! Metrics collection for unit production

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for the unit producer
#[derive(Debug, Default)]
pub struct Metrics {
    /// Units produced by this node
    pub units_produced: AtomicU64,

    /// Slots skipped between consecutive units committed by this node
    pub slots_missed: AtomicU64,

    /// Slot checks where another mediator was scheduled
    pub not_my_turn: AtomicU64,

    /// Slot checks abandoned because the node woke too far from the slot start
    pub lag_events: AtomicU64,

    /// Production attempts that failed in signing or storage
    pub production_failures: AtomicU64,

    /// Round reshuffles triggered by units from this node
    pub reshuffles: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a produced unit
    pub fn record_unit_produced(&self, missed_units: u64, reshuffled: bool) {
        self.units_produced.fetch_add(1, Ordering::Relaxed);
        self.slots_missed.fetch_add(missed_units, Ordering::Relaxed);
        if reshuffled {
            self.reshuffles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a slot owned by another mediator
    pub fn record_not_my_turn(&self) {
        self.not_my_turn.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a late wake-up
    pub fn record_lag(&self) {
        self.lag_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed production attempt
    pub fn record_failure(&self) {
        self.production_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get units produced
    pub fn get_units_produced(&self) -> u64 {
        self.units_produced.load(Ordering::Relaxed)
    }

    /// Get failed production attempts
    pub fn get_production_failures(&self) -> u64 {
        self.production_failures.load(Ordering::Relaxed)
    }

    /// Get average missed slots per produced unit
    pub fn get_avg_missed_per_unit(&self) -> f64 {
        let units = self.units_produced.load(Ordering::Relaxed);
        if units == 0 {
            return 0.0;
        }
        let missed = self.slots_missed.load(Ordering::Relaxed);
        missed as f64 / units as f64
    }
}
