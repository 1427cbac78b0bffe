//! Rolling participation window over the last 128 slots.
//!
//! Each bit of `recent_slots_filled` is one slot, newest in bit 0. A produced
//! unit shifts in `missed` zero bits followed by a single one bit.

/// Number of slots tracked by the window
pub const PARTICIPATION_WINDOW: u32 = u128::BITS;

/// Shift `missed` empty slots and one filled slot into the window.
pub fn record_production(recent_slots_filled: u128, missed: u64) -> u128 {
    let shift = missed.saturating_add(1);
    let shifted = u32::try_from(shift)
        .ok()
        .and_then(|s| recent_slots_filled.checked_shl(s))
        .unwrap_or(0);
    shifted | 1
}

/// Fraction of the last 128 slots that produced a unit, in `[0.0, 1.0]`.
pub fn participation_rate(recent_slots_filled: u128) -> f64 {
    f64::from(recent_slots_filled.count_ones()) / f64::from(PARTICIPATION_WINDOW)
}
