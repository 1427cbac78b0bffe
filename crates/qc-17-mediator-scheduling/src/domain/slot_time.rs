//! Slot/time mapping
//!
//! Slots are counted relative to the last produced unit: slot 1 is the next
//! production opportunity, slot 2 the one after, and so on. Slot 0 is the
//! "no slot" sentinel and maps to the unix epoch.
//!
//! All times are unix seconds. The interval is a `NonZeroU64`, so none of the
//! divisions below can fault.

use super::entities::{DynamicGlobalProperty, GlobalProperty};

/// Extra offset applied to slot times after a maintenance unit.
///
/// Maintenance intervals are not scheduled by this core, so the offset is
/// always zero. It is kept as the single place a maintenance skip would be
/// inserted into slot arithmetic.
#[inline]
pub fn maintenance_offset(_gp: &GlobalProperty, _dgp: &DynamicGlobalProperty) -> u64 {
    0
}

/// Start time of the `slot_num`-th slot after the last unit.
pub fn get_slot_time(gp: &GlobalProperty, dgp: &DynamicGlobalProperty, slot_num: u32) -> u64 {
    if slot_num == 0 {
        return 0;
    }

    let interval = gp.chain_parameters().interval();
    let offset = u64::from(slot_num) * interval;

    // First unit is produced one interval after genesis
    if dgp.last_unit_num == 0 {
        return dgp.last_unit_time + offset;
    }

    let unit_abs_slot = dgp.last_unit_time / interval;
    let unit_slot_time = unit_abs_slot * interval;

    unit_slot_time + maintenance_offset(gp, dgp) + offset
}

/// Greatest slot `N` with `get_slot_time(N) <= when`, or 0 if `when` precedes slot 1.
pub fn get_slot_at_time(gp: &GlobalProperty, dgp: &DynamicGlobalProperty, when: u64) -> u32 {
    let first_slot_time = get_slot_time(gp, dgp, 1);
    if when < first_slot_time {
        return 0;
    }

    let interval = gp.chain_parameters().interval();
    let slots = (when - first_slot_time) / interval + 1;
    u32::try_from(slots).unwrap_or(u32::MAX)
}

/// Whether the next production opportunity is now or in the future.
pub fn is_synced(gp: &GlobalProperty, dgp: &DynamicGlobalProperty, now: u64) -> bool {
    get_slot_time(gp, dgp, 1) >= now
}
