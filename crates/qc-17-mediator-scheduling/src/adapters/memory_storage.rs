//! In-memory unit storage
//!
//! Units live in an append-only arena; a hash index maps unit hashes to arena
//! positions so predecessors are resolved by lookup instead of by pointer.

use crate::domain::VerifiedUnit;
use crate::error::{Result, SchedulingError};
use crate::ports::{ChainTip, UnitStorage};
use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::H256;
use std::collections::HashMap;

#[derive(Default)]
struct Arena {
    units: Vec<VerifiedUnit>,
    index: HashMap<H256, usize>,
}

/// In-memory storage adapter for tests and single-process simulations
#[derive(Default)]
pub struct InMemoryUnitStorage {
    arena: RwLock<Arena>,
    tip: RwLock<Option<ChainTip>>,
    genesis_hash: Option<H256>,
}

impl InMemoryUnitStorage {
    /// Empty storage accepting any unit #1 as the start of the chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty storage whose unit #1 must link to `genesis_hash`
    pub fn with_genesis(genesis_hash: H256) -> Self {
        Self {
            genesis_hash: Some(genesis_hash),
            ..Self::default()
        }
    }

    /// Record the scheduling state to resume from after a restart
    pub fn save_tip(&self, tip: ChainTip) {
        *self.tip.write() = Some(tip);
    }

    /// Look up a unit by hash
    pub fn get_unit(&self, hash: &H256) -> Option<VerifiedUnit> {
        let arena = self.arena.read();
        arena.index.get(hash).map(|&i| arena.units[i].clone())
    }

    /// Most recently appended unit
    pub fn head(&self) -> Option<VerifiedUnit> {
        self.arena.read().units.last().cloned()
    }

    /// Number of stored units
    pub fn unit_count(&self) -> usize {
        self.arena.read().units.len()
    }

    /// Walk back from `hash` through `previous_unit` links, newest first
    pub fn ancestors(&self, hash: &H256) -> Vec<VerifiedUnit> {
        let arena = self.arena.read();
        let mut chain = Vec::new();
        let mut cursor = arena.index.get(hash).copied();
        while let Some(i) = cursor {
            let unit = &arena.units[i];
            cursor = unit
                .previous_unit
                .and_then(|prev| arena.index.get(&prev).copied());
            chain.push(unit.clone());
        }
        chain
    }
}

#[async_trait]
impl UnitStorage for InMemoryUnitStorage {
    async fn append_unit(&self, unit: VerifiedUnit) -> Result<()> {
        let mut arena = self.arena.write();

        let linked = match (arena.units.last(), self.genesis_hash) {
            (Some(head), _) => unit.previous_unit == Some(head.hash()),
            (None, Some(genesis)) => unit.previous_unit == Some(genesis),
            (None, None) => unit.unit_num == 1 && unit.previous_unit.is_some(),
        };
        if !linked {
            return Err(SchedulingError::StorageError(format!(
                "unit #{} does not extend the stored head",
                unit.unit_num
            )));
        }

        let hash = unit.hash();
        let position = arena.units.len();
        arena.units.push(unit);
        arena.index.insert(hash, position);
        Ok(())
    }

    async fn load_tip(&self) -> Result<Option<ChainTip>> {
        Ok(self.tip.read().clone())
    }
}
