//! Domain entities for mediator scheduling

use crate::error::{Result, SchedulingError};
use crate::utils::hashing::sha256;
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroU64;
use std::sync::Arc;

/// An authorized producer in the DPoS committee
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mediator {
    /// Public identity of the mediator
    pub name: String,

    /// Reference to the signing key held by key custody
    pub signing_reference: String,
}

impl Mediator {
    /// Create a new mediator identity
    pub fn new(name: impl Into<String>, signing_reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_reference: signing_reference.into(),
        }
    }
}

/// Chain parameters that change only at maintenance boundaries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParameters {
    /// Length of one production slot in seconds
    pub verified_unit_interval: NonZeroU64,

    /// Slots skipped when a maintenance interval is entered
    #[serde(default)]
    pub maintenance_skip_slots: u32,
}

impl ChainParameters {
    /// Build chain parameters, rejecting a zero interval
    pub fn new(verified_unit_interval: u64, maintenance_skip_slots: u32) -> Result<Self> {
        let verified_unit_interval = NonZeroU64::new(verified_unit_interval).ok_or_else(|| {
            SchedulingError::InvalidConfig("verified unit interval must be > 0".to_string())
        })?;
        Ok(Self {
            verified_unit_interval,
            maintenance_skip_slots,
        })
    }

    /// Slot length in seconds
    #[inline]
    pub fn interval(&self) -> u64 {
        self.verified_unit_interval.get()
    }
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            verified_unit_interval: NonZeroU64::new(crate::DEFAULT_UNIT_INTERVAL_SECS)
                .unwrap_or(NonZeroU64::MIN),
            maintenance_skip_slots: 0,
        }
    }
}

/// The current committee: chain parameters plus the ordered active mediators
#[derive(Clone, Debug, Serialize)]
pub struct GlobalProperty {
    chain_parameters: ChainParameters,
    active_mediators: Vec<Arc<Mediator>>,
}

impl GlobalProperty {
    /// Build a committee. The active set must be non-empty and free of duplicate names.
    pub fn new(chain_parameters: ChainParameters, active_mediators: Vec<Arc<Mediator>>) -> Result<Self> {
        if active_mediators.is_empty() {
            return Err(SchedulingError::EmptyCommittee);
        }

        let mut seen = HashSet::with_capacity(active_mediators.len());
        for mediator in &active_mediators {
            if !seen.insert(mediator.name.as_str()) {
                return Err(SchedulingError::DuplicateMediator(mediator.name.clone()));
            }
        }

        Ok(Self {
            chain_parameters,
            active_mediators,
        })
    }

    /// Chain parameters in effect
    pub fn chain_parameters(&self) -> &ChainParameters {
        &self.chain_parameters
    }

    /// Active mediators in registry order
    pub fn active_mediators(&self) -> &[Arc<Mediator>] {
        &self.active_mediators
    }

    /// Number of active mediators (the round length)
    pub fn active_count(&self) -> usize {
        self.active_mediators.len()
    }

    /// Look up an active mediator by name
    pub fn active_mediator(&self, name: &str) -> Option<&Arc<Mediator>> {
        self.active_mediators.iter().find(|m| m.name == name)
    }

    /// Whether `name` belongs to the active committee
    pub fn is_active_mediator(&self, name: &str) -> bool {
        self.active_mediator(name).is_some()
    }
}

/// Mutable tip-of-chain bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicGlobalProperty {
    /// Number of the most recent unit (0 = nothing produced since genesis)
    pub last_unit_num: u64,

    /// Hash of the most recent unit (genesis hash before the first production)
    pub last_unit_hash: H256,

    /// Unix time of the most recent unit; genesis time while `last_unit_num == 0`
    pub last_unit_time: u64,

    /// Mediator that produced the most recent unit
    pub current_mediator: Option<Arc<Mediator>>,

    /// Slots elapsed since genesis, including missed ones
    pub current_absolute_slot: u64,

    /// Rolling bitmap over the last 128 slots, bit set = slot filled
    pub recent_slots_filled: u128,

    /// Whether the last applied unit triggered a reshuffle
    pub is_shuffled_schedule: bool,
}

impl DynamicGlobalProperty {
    /// Initial dynamic state for a chain that starts at `genesis_time`
    pub fn genesis(genesis_time: u64, genesis_hash: H256) -> Self {
        Self {
            last_unit_num: 0,
            last_unit_hash: genesis_hash,
            last_unit_time: genesis_time,
            current_mediator: None,
            current_absolute_slot: 0,
            recent_slots_filled: u128::MAX,
            is_shuffled_schedule: false,
        }
    }

    /// Hash the next unit must link to. Unit #1 links to the genesis hash.
    pub fn previous_unit(&self) -> H256 {
        self.last_unit_hash
    }
}

/// A signed unit of the chain, linked to its predecessor by hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUnit {
    /// Hash of the previous unit, `None` only for the genesis unit itself
    pub previous_unit: Option<H256>,

    /// Height of this unit
    pub unit_num: u64,

    /// Unix time of the slot this unit was produced in
    pub timestamp: u64,

    /// Name of the producing mediator
    pub mediator: String,

    /// Signature over [`VerifiedUnit::signing_payload`]
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl VerifiedUnit {
    /// Unsigned unit, ready to have its payload signed
    pub fn unsigned(
        previous_unit: Option<H256>,
        unit_num: u64,
        timestamp: u64,
        mediator: impl Into<String>,
    ) -> Self {
        Self {
            previous_unit,
            unit_num,
            timestamp,
            mediator: mediator.into(),
            signature: Vec::new(),
        }
    }

    /// Canonical bytes covered by the mediator signature
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(32 + 8 + 8 + self.mediator.len());
        payload.extend_from_slice(self.previous_unit.unwrap_or_default().as_bytes());
        payload.extend_from_slice(&self.unit_num.to_be_bytes());
        payload.extend_from_slice(&self.timestamp.to_be_bytes());
        payload.extend_from_slice(self.mediator.as_bytes());
        payload
    }

    /// Unit identifier: SHA-256 over payload and signature
    pub fn hash(&self) -> H256 {
        let mut bytes = self.signing_payload();
        bytes.extend_from_slice(&self.signature);
        H256::from(sha256(&bytes))
    }

    /// Whether a signature has been attached
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Per-mediator production statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatorStats {
    /// Slots this mediator was scheduled for but did not fill
    pub total_missed: u64,

    /// Units this mediator produced
    pub total_produced: u64,

    /// Number of the last unit this mediator produced
    pub last_confirmed_unit_num: u64,
}
