//! Domain layer - Pure scheduling logic
//!
//! Nothing in here performs I/O or awaits. Given the same committee, tip
//! bookkeeping and unit, every node computes the same slots, the same round
//! order and the same state transition.
//!
//! ## Entities
//!
//! - [`Mediator`], [`GlobalProperty`]: the committee and its chain parameters
//! - [`DynamicGlobalProperty`]: tip-of-chain bookkeeping
//! - [`VerifiedUnit`]: a signed unit linked to its predecessor by hash
//!
//! ## Services
//!
//! - [`slot_time`]: slot <-> unix time mapping
//! - [`MediatorSchedule`]: per-round xorshift64* shuffle
//! - [`ChainState`]: the aggregate mutated by unit commits
//!
//! ## Invariants
//!
//! 1. Committed units are signed
//! 2. Unit numbers advance by one and link to the tip
//! 3. Unit timestamps strictly increase

mod chain_state;
mod entities;
pub mod invariants;
pub mod participation;
mod schedule;
pub mod slot_time;

pub use chain_state::{ChainState, CommitSummary, SharedChainState};
pub use entities::*;
pub use invariants::check_all_invariants;
pub use participation::{participation_rate, PARTICIPATION_WINDOW};
pub use schedule::{shuffle, MediatorSchedule, SHUFFLE_MULTIPLIER};
pub use slot_time::{get_slot_at_time, get_slot_time, is_synced};
