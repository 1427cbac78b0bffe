//! Unit Producer Service
//!
//! Runs one production attempt per slot:
//!
//! 1. **Eligibility**: on a snapshot of chain state, find the slot for "now"
//!    and the mediator scheduled for it. Bail out with a non-error
//!    [`ProductionCondition`] unless this node controls that mediator, holds
//!    its key and woke close enough to the slot start.
//! 2. **Construction**: build the unit and sign it, re-check it against the
//!    current chain state, then append it to storage. Signing and storage are
//!    bounded by timeouts and run without holding the state lock.
//! 3. **Commit**: apply the unit to chain state under the write lock, then hand
//!    it to the broadcaster without waiting for delivery.
//!
//! A failure in step 2 leaves chain state and storage untouched and costs only
//! this slot.

use crate::config::SchedulingConfig;
use crate::domain::{
    ChainState, DynamicGlobalProperty, GlobalProperty, Mediator, MediatorSchedule, MediatorStats,
    SharedChainState, VerifiedUnit,
};
use crate::error::{Result, SchedulingError};
use crate::metrics::Metrics;
use crate::ports::{
    SchedulingQuery, SystemTimeSource, TimeSource, UnitBroadcaster, UnitSigner, UnitStorage,
};
use parking_lot::RwLock;
use primitive_types::H256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one production attempt
#[derive(Debug)]
pub enum ProductionCondition {
    /// A unit was produced and committed
    Produced {
        /// Number of the new unit
        unit_num: u64,
        /// Hash of the new unit
        unit_hash: H256,
        /// Slot start time used as unit timestamp
        timestamp: u64,
        /// Producing mediator
        mediator: String,
        /// Slots skipped since the previous unit
        missed_units: u64,
    },

    /// Production is disabled until the chain tip is recent
    NotSynced {
        /// Next slot time according to the stale tip
        next_slot_time: u64,
        /// Rounded current time
        now: u64,
    },

    /// No slot has started since the last unit
    NotTimeYet {
        /// Start of the next slot
        next_slot_time: u64,
        /// Rounded current time
        now: u64,
    },

    /// Another node's mediator owns this slot
    NotMyTurn {
        /// Slot number relative to the tip
        slot: u32,
        /// Mediator scheduled for the slot
        scheduled_mediator: String,
    },

    /// This node is configured for the mediator but cannot sign for it
    NoPrivateKey {
        /// Slot number relative to the tip
        slot: u32,
        /// Missing signing reference
        signing_reference: String,
    },

    /// The scheduled mediator also produced the tip unit
    Consecutive {
        /// Slot number relative to the tip
        slot: u32,
        /// Mediator that would produce twice in a row
        mediator: String,
    },

    /// Too few recent slots were filled
    LowParticipation {
        /// Slot number relative to the tip
        slot: u32,
        /// Share of the last 128 slots that were filled
        participation_rate: f64,
        /// Configured minimum
        required: f64,
    },

    /// Woke too far from the slot start
    Lag {
        /// Slot number relative to the tip
        slot: u32,
        /// Slot start time (seconds)
        scheduled_time: u64,
        /// Current time (milliseconds)
        now_millis: u64,
    },

    /// Signing or storage failed, or the state moved on while signing.
    /// State untouched, retry next slot.
    Failed {
        /// Slot number relative to the tip
        slot: u32,
        /// Collaborator failure
        error: SchedulingError,
    },
}

impl ProductionCondition {
    /// Whether a unit was produced
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced { .. })
    }
}

/// Collaborators of the unit producer
pub struct ProducerDependencies<S, T, B> {
    /// Key custody
    pub signer: Arc<S>,
    /// Unit persistence
    pub storage: Arc<T>,
    /// Network hand-off
    pub broadcaster: Arc<B>,
    /// Producer configuration
    pub config: SchedulingConfig,
}

/// Unit production pipeline for one node
pub struct UnitProducer<S, T, B>
where
    S: UnitSigner,
    T: UnitStorage,
    B: UnitBroadcaster + 'static,
{
    state: SharedChainState,
    signer: Arc<S>,
    storage: Arc<T>,
    broadcaster: Arc<B>,
    config: SchedulingConfig,
    time_source: Arc<dyn TimeSource>,
    production_enabled: AtomicBool,
    consecutive_allowed: AtomicBool,
    metrics: Arc<Metrics>,
}

impl<S, T, B> UnitProducer<S, T, B>
where
    S: UnitSigner,
    T: UnitStorage,
    B: UnitBroadcaster + 'static,
{
    /// Create a producer. Invalid configuration is refused here, before any
    /// production loop can start.
    pub fn new(state: SharedChainState, deps: ProducerDependencies<S, T, B>) -> Result<Self> {
        deps.config.validate()?;

        info!("[qc-17] Initializing Unit Producer");
        info!("  Local mediators: {:?}", deps.config.local_mediators);
        info!("  Stale production: {}", deps.config.enable_stale_production);
        info!(
            "  Required participation: {:.2}",
            deps.config.required_participation
        );

        Ok(Self {
            state,
            signer: deps.signer,
            storage: deps.storage,
            broadcaster: deps.broadcaster,
            production_enabled: AtomicBool::new(deps.config.enable_stale_production),
            consecutive_allowed: AtomicBool::new(deps.config.allow_consecutive),
            config: deps.config,
            time_source: Arc::new(SystemTimeSource),
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Set custom time source (for testing)
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Shared chain state
    pub fn state(&self) -> SharedChainState {
        Arc::clone(&self.state)
    }

    /// Production metrics
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Time source used for slot decisions
    pub fn time_source(&self) -> Arc<dyn TimeSource> {
        Arc::clone(&self.time_source)
    }

    /// Producer configuration
    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Whether stale-chain protection has been lifted
    pub fn is_production_enabled(&self) -> bool {
        self.production_enabled.load(Ordering::SeqCst)
    }

    /// Try to produce the unit for the current slot.
    ///
    /// Returns `Err` only for critical errors (broken committee or chain
    /// state invariants); everything else is a [`ProductionCondition`].
    pub async fn maybe_produce_unit(&self) -> Result<ProductionCondition> {
        let now_millis = self.time_source.now_millis();
        let now = self.time_source.now_rounded_secs();

        let (slot, mediator, unit) = match self.check_eligibility(now, now_millis)? {
            Ok(plan) => plan,
            Err(condition) => return Ok(condition),
        };

        let unit = match self.sign_and_store(&mediator, unit).await {
            Ok(unit) => unit,
            Err(error) => {
                warn!(
                    "[qc-17] Slot {} skipped, unit #{} not produced: {}",
                    slot,
                    self.state.read().dynamic_global_property().last_unit_num + 1,
                    error
                );
                self.metrics.record_failure();
                return Ok(ProductionCondition::Failed { slot, error });
            }
        };

        // The unit is already stored, so only a concurrent writer racing the
        // storage append can make this commit fail.

        let summary = self.state.write().update_global_dyn_prop(&unit)?;
        self.metrics
            .record_unit_produced(summary.missed_units, summary.reshuffled);

        let unit_hash = unit.hash();
        let condition = ProductionCondition::Produced {
            unit_num: unit.unit_num,
            unit_hash,
            timestamp: unit.timestamp,
            mediator: unit.mediator.clone(),
            missed_units: summary.missed_units,
        };

        let broadcaster = Arc::clone(&self.broadcaster);
        tokio::spawn(async move {
            let unit_num = unit.unit_num;
            if let Err(e) = broadcaster.publish(unit).await {
                warn!("[qc-17] Failed to broadcast unit #{}: {}", unit_num, e);
            }
        });

        Ok(condition)
    }

    /// Phase 1: decide on a single snapshot whether this node produces now.
    ///
    /// The outer `Result` carries critical errors, the inner one either the
    /// production plan or the reason for not producing.
    #[allow(clippy::type_complexity)]
    fn check_eligibility(
        &self,
        now: u64,
        now_millis: u64,
    ) -> Result<std::result::Result<(u32, Arc<Mediator>, VerifiedUnit), ProductionCondition>> {
        let state = self.state.read();
        let next_slot_time = state.slot_time(1);

        // If the next production opportunity is now or later, we are synced
        if !self.production_enabled.load(Ordering::SeqCst) {
            if next_slot_time >= now {
                info!("[qc-17] Chain tip is recent, enabling unit production");
                self.production_enabled.store(true, Ordering::SeqCst);
            } else {
                return Ok(Err(ProductionCondition::NotSynced {
                    next_slot_time,
                    now,
                }));
            }
        }

        let slot = state.slot_at_time(now);
        if slot == 0 {
            return Ok(Err(ProductionCondition::NotTimeYet {
                next_slot_time,
                now,
            }));
        }

        let mediator = state.scheduled_mediator(slot)?;
        if !self.config.controls(&mediator.name) {
            self.metrics.record_not_my_turn();
            return Ok(Err(ProductionCondition::NotMyTurn {
                slot,
                scheduled_mediator: mediator.name.clone(),
            }));
        }

        if !self.signer.can_sign(&mediator) {
            return Ok(Err(ProductionCondition::NoPrivateKey {
                slot,
                signing_reference: mediator.signing_reference.clone(),
            }));
        }

        if state.is_consecutive_mediator(&mediator.name) {
            if self.consecutive_allowed.swap(false, Ordering::SeqCst) {
                info!(
                    "[qc-17] {} produces consecutively, override now used up",
                    mediator.name
                );
            } else {
                return Ok(Err(ProductionCondition::Consecutive {
                    slot,
                    mediator: mediator.name.clone(),
                }));
            }
        }

        let participation_rate = state.participation_rate();
        if participation_rate < self.config.required_participation {
            return Ok(Err(ProductionCondition::LowParticipation {
                slot,
                participation_rate,
                required: self.config.required_participation,
            }));
        }

        let scheduled_time = state.slot_time(slot);
        let drift = scheduled_time.saturating_mul(1_000).abs_diff(now_millis);
        if drift > self.config.lag_tolerance_ms {
            self.metrics.record_lag();
            return Ok(Err(ProductionCondition::Lag {
                slot,
                scheduled_time,
                now_millis,
            }));
        }

        let dgp = state.dynamic_global_property();
        let unit = VerifiedUnit::unsigned(
            Some(dgp.previous_unit()),
            dgp.last_unit_num + 1,
            scheduled_time,
            mediator.name.clone(),
        );
        debug!(
            "[qc-17] Producing unit #{} for slot {} as {}",
            unit.unit_num, slot, mediator.name
        );
        Ok(Ok((slot, mediator, unit)))
    }

    /// Phase 2: sign and persist, each bounded by its timeout.
    ///
    /// Between the two, the signed unit is checked against the live state so
    /// that a committee change or a foreign unit committed while signing
    /// never leaves an uncommittable unit in storage.
    async fn sign_and_store(&self, mediator: &Mediator, mut unit: VerifiedUnit) -> Result<VerifiedUnit> {
        let payload = unit.signing_payload();
        let signature = tokio::time::timeout(
            self.config.signer_timeout(),
            self.signer.sign(mediator, &payload),
        )
        .await
        .map_err(|_| SchedulingError::SignerTimeout {
            timeout_ms: self.config.signer_timeout_ms,
        })??;

        if signature.is_empty() {
            return Err(SchedulingError::SignerError(format!(
                "empty signature for {}",
                mediator.name
            )));
        }
        unit.signature = signature;

        self.state
            .read()
            .validate_unit(&unit)
            .map_err(|e| SchedulingError::ScheduleChanged(e.to_string()))?;

        tokio::time::timeout(
            self.config.storage_timeout(),
            self.storage.append_unit(unit.clone()),
        )
        .await
        .map_err(|_| SchedulingError::StorageTimeout {
            timeout_ms: self.config.storage_timeout_ms,
        })??;

        Ok(unit)
    }
}

/// Rebuild chain state from storage, or start a new chain at `genesis_time`.
pub async fn restore_chain_state<T: UnitStorage>(
    storage: &T,
    global: GlobalProperty,
    genesis_time: u64,
    genesis_hash: H256,
) -> Result<ChainState> {
    match storage.load_tip().await? {
        Some(tip) => {
            info!(
                "[qc-17] Resuming from unit #{} at absolute slot {}",
                tip.dynamic.last_unit_num, tip.dynamic.current_absolute_slot
            );
            let schedule = MediatorSchedule::from_order(tip.shuffled_mediators);
            ChainState::from_parts(global, tip.dynamic, schedule, tip.mediator_stats)
        }
        None => {
            info!("[qc-17] No persisted tip, starting new chain");
            Ok(ChainState::genesis(global, genesis_time, genesis_hash))
        }
    }
}

impl SchedulingQuery for RwLock<ChainState> {
    fn global_property(&self) -> GlobalProperty {
        self.read().global_property().clone()
    }

    fn dynamic_global_property(&self) -> DynamicGlobalProperty {
        self.read().dynamic_global_property().clone()
    }

    fn scheduled_mediator(&self, slot_num: u32) -> Result<Arc<Mediator>> {
        self.read().scheduled_mediator(slot_num)
    }

    fn slot_time(&self, slot_num: u32) -> u64 {
        self.read().slot_time(slot_num)
    }

    fn slot_at_time(&self, when: u64) -> u32 {
        self.read().slot_at_time(when)
    }

    fn mediator_stats(&self, name: &str) -> MediatorStats {
        self.read().mediator_stats(name)
    }

    fn participation_rate(&self) -> f64 {
        self.read().participation_rate()
    }

    fn is_synced(&self, now: u64) -> bool {
        self.read().is_synced(now)
    }
}
