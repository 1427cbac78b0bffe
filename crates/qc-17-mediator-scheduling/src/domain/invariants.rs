//! Invariant checks applied to a unit before it is committed to chain state.
//!
//! A unit that fails any of these was built from a state other than the one it
//! is being applied to, or was never signed. Both are programming errors in
//! the pipeline, not recoverable slot failures.

use super::entities::{DynamicGlobalProperty, VerifiedUnit};
use crate::error::{Result, SchedulingError};

/// INVARIANT-1: Signature presence
pub fn check_signature_present(unit: &VerifiedUnit) -> Result<()> {
    if !unit.is_signed() {
        return Err(SchedulingError::InvariantViolation(format!(
            "unit #{} has no signature",
            unit.unit_num
        )));
    }
    Ok(())
}

/// INVARIANT-2: Unit numbers advance by exactly one and link to the tip
pub fn check_successor(dgp: &DynamicGlobalProperty, unit: &VerifiedUnit) -> Result<()> {
    let expected = dgp.last_unit_num + 1;
    if unit.unit_num != expected || unit.previous_unit != Some(dgp.previous_unit()) {
        return Err(SchedulingError::StaleState {
            expected,
            actual: unit.unit_num,
        });
    }
    Ok(())
}

/// INVARIANT-3: Timestamp monotonicity
///
/// After the first unit, a new unit must be strictly later than the tip.
/// Before it, the unit must be strictly later than genesis time.
pub fn check_timestamp_after_tip(dgp: &DynamicGlobalProperty, unit: &VerifiedUnit) -> Result<()> {
    if unit.timestamp <= dgp.last_unit_time {
        return Err(SchedulingError::InvariantViolation(format!(
            "unit #{} timestamp {} not after tip time {}",
            unit.unit_num, unit.timestamp, dgp.last_unit_time
        )));
    }
    Ok(())
}

/// Run every invariant in order
pub fn check_all_invariants(dgp: &DynamicGlobalProperty, unit: &VerifiedUnit) -> Result<()> {
    check_signature_present(unit)?;
    check_successor(dgp, unit)?;
    check_timestamp_after_tip(dgp, unit)?;
    Ok(())
}
