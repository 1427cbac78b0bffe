//! Configuration types for mediator scheduling

use crate::domain::ChainParameters;
use crate::error::{Result, SchedulingError};
use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration for the unit producer and production loop
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Chain parameters used when bootstrapping a new chain
    pub chain: ChainParameters,

    /// Mediators this node produces for
    pub local_mediators: Vec<String>,

    /// Produce even when the chain tip is stale.
    /// Must be `true` for the first node of a new chain.
    pub enable_stale_production: bool,

    /// Maximum distance from the slot start at which a unit may still be produced
    pub lag_tolerance_ms: u64,

    /// Upper bound on one signing request
    pub signer_timeout_ms: u64,

    /// Upper bound on one storage append
    pub storage_timeout_ms: u64,

    /// Minimum share of recent slots filled (0.0 to 1.0) before producing
    pub required_participation: f64,

    /// Let a mediator produce two units in a row once
    pub allow_consecutive: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            chain: ChainParameters::default(),
            local_mediators: Vec::new(),
            enable_stale_production: false,
            lag_tolerance_ms: crate::DEFAULT_LAG_TOLERANCE_MS,
            signer_timeout_ms: 1_000,
            storage_timeout_ms: 1_000,
            required_participation: 0.0,
            allow_consecutive: false,
        }
    }
}

impl SchedulingConfig {
    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the production loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.local_mediators.is_empty() {
            return Err(SchedulingError::InvalidConfig(
                "no local mediators configured".to_string(),
            ));
        }
        if self.signer_timeout_ms == 0 || self.storage_timeout_ms == 0 {
            return Err(SchedulingError::InvalidConfig(
                "collaborator timeouts must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.required_participation) {
            return Err(SchedulingError::InvalidConfig(format!(
                "required participation {} outside 0.0..=1.0",
                self.required_participation
            )));
        }
        let slot_ms = self.chain.interval().saturating_mul(1_000);
        if self.lag_tolerance_ms >= slot_ms {
            return Err(SchedulingError::InvalidConfig(format!(
                "lag tolerance {}ms must be shorter than the {}ms slot",
                self.lag_tolerance_ms, slot_ms
            )));
        }
        Ok(())
    }

    /// Whether this node produces for `name`
    pub fn controls(&self, name: &str) -> bool {
        self.local_mediators.iter().any(|m| m == name)
    }

    /// Signing timeout as a `Duration`
    pub fn signer_timeout(&self) -> Duration {
        Duration::from_millis(self.signer_timeout_ms)
    }

    /// Storage timeout as a `Duration`
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}
