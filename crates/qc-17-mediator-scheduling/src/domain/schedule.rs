//! Mediator production order
//!
//! Once per round (a round is `active_count` units) the active committee is
//! permuted with a xorshift64* generator seeded from the last unit time. Every
//! node derives the same order from the same chain state, so the algorithm
//! below is consensus-critical and must stay bit-exact: a single forward pass
//! of swaps, wrapping 64-bit arithmetic, seed in the high 32 bits.

use super::entities::{DynamicGlobalProperty, GlobalProperty, Mediator};
use crate::error::{Result, SchedulingError};
use std::sync::Arc;
use tracing::debug;

/// Odd 64-bit multiplier of the xorshift64* generator
pub const SHUFFLE_MULTIPLIER: u64 = 2_685_821_657_736_338_717;

/// Shuffled production order for the current round
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediatorSchedule {
    shuffled_mediators: Vec<Arc<Mediator>>,
}

impl MediatorSchedule {
    /// Build the schedule for a freshly loaded chain state.
    ///
    /// Starts from registry order and applies [`MediatorSchedule::update`],
    /// which shuffles whenever the state sits on a round boundary (always true
    /// at genesis).
    pub fn initialize(gp: &GlobalProperty, dgp: &DynamicGlobalProperty) -> Self {
        let mut schedule = Self {
            shuffled_mediators: gp.active_mediators().to_vec(),
        };
        schedule.update(gp, dgp);
        schedule
    }

    /// Restore a schedule persisted by the storage layer
    pub fn from_order(shuffled_mediators: Vec<Arc<Mediator>>) -> Self {
        Self { shuffled_mediators }
    }

    /// Production order for the current round
    pub fn shuffled_mediators(&self) -> &[Arc<Mediator>] {
        &self.shuffled_mediators
    }

    /// Reshuffle if `dgp` sits on a round boundary. Returns whether it did.
    pub fn update(&mut self, gp: &GlobalProperty, dgp: &DynamicGlobalProperty) -> bool {
        let active_count = gp.active_count() as u64;
        if active_count == 0 || dgp.last_unit_num % active_count != 0 {
            return false;
        }

        self.shuffled_mediators.clear();
        self.shuffled_mediators
            .extend(gp.active_mediators().iter().cloned());

        shuffle(&mut self.shuffled_mediators, dgp.last_unit_time);

        debug!(
            "[qc-17] Reshuffled {} mediators at unit #{}",
            active_count, dgp.last_unit_num
        );
        true
    }

    /// Mediator scheduled for the `slot_num`-th slot after the last unit.
    ///
    /// The order repeats every `len` absolute slots. An empty schedule means the
    /// committee contract was broken upstream and is reported as a critical error.
    pub fn get_scheduled_mediator(
        &self,
        dgp: &DynamicGlobalProperty,
        slot_num: u32,
    ) -> Result<&Arc<Mediator>> {
        if self.shuffled_mediators.is_empty() {
            return Err(SchedulingError::EmptySchedule);
        }

        let absolute_slot = dgp.current_absolute_slot + u64::from(slot_num);
        let index = (absolute_slot % self.shuffled_mediators.len() as u64) as usize;
        Ok(&self.shuffled_mediators[index])
    }
}

/// In-place single-pass swap shuffle seeded from `unit_time`
pub fn shuffle<T>(items: &mut [T], unit_time: u64) {
    let size = items.len() as u64;
    let now_hi = unit_time << 32;

    for i in 0..size {
        let mut k = now_hi.wrapping_add(i.wrapping_mul(SHUFFLE_MULTIPLIER));
        k ^= k >> 12;
        k ^= k << 25;
        k ^= k >> 27;
        k = k.wrapping_mul(SHUFFLE_MULTIPLIER);

        let j = i + k % (size - i);
        items.swap(i as usize, j as usize);
    }
}
