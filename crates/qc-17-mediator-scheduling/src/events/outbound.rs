//! Outbound events (published)

use crate::domain::VerifiedUnit;
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// Event: Verified unit produced by this node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitProducedEvent {
    /// Event version
    pub version: u16,

    /// Sender subsystem ID (always 17)
    pub sender_id: u8,

    /// Produced unit hash
    pub unit_hash: H256,

    /// The signed unit
    pub unit: VerifiedUnit,
}

impl UnitProducedEvent {
    /// Wrap a signed unit for publication
    pub fn new(unit: VerifiedUnit) -> Self {
        Self {
            version: 1,
            sender_id: crate::SUBSYSTEM_ID,
            unit_hash: unit.hash(),
            unit,
        }
    }
}
