//! Production loop
//!
//! Wakes at every slot boundary, runs one [`UnitProducer::maybe_produce_unit`]
//! attempt and logs its outcome. The loop stops on shutdown or on a critical
//! error; everything else is logged and the next slot is tried.

use crate::error::Result;
use crate::ports::{UnitBroadcaster, UnitSigner, UnitStorage};
use crate::service::{ProductionCondition, UnitProducer};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where the loop currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Not started, or stopped
    Idle,
    /// Sleeping until the next slot boundary
    WaitingForSlot,
    /// Running a production attempt
    Producing,
}

/// Drives a [`UnitProducer`] once per slot
pub struct ProductionLoop<S, T, B>
where
    S: UnitSigner,
    T: UnitStorage,
    B: UnitBroadcaster + 'static,
{
    producer: Arc<UnitProducer<S, T, B>>,
    loop_state: Arc<RwLock<LoopState>>,
}

impl<S, T, B> ProductionLoop<S, T, B>
where
    S: UnitSigner,
    T: UnitStorage,
    B: UnitBroadcaster + 'static,
{
    /// Create an idle loop around `producer`
    pub fn new(producer: Arc<UnitProducer<S, T, B>>) -> Self {
        Self {
            producer,
            loop_state: Arc::new(RwLock::new(LoopState::Idle)),
        }
    }

    /// Handle for observing the loop from another task
    pub fn state_handle(&self) -> Arc<RwLock<LoopState>> {
        Arc::clone(&self.loop_state)
    }

    /// Current loop state
    pub fn loop_state(&self) -> LoopState {
        *self.loop_state.read()
    }

    /// Time left until the next slot boundary, measured against a snapshot
    /// of chain state taken now.
    pub fn time_to_next_slot(&self) -> Duration {
        let now_millis = self.producer.time_source().now_millis();
        let next_slot_time = {
            let state = self.producer.state();
            let state = state.read();
            let current = state.slot_at_time(now_millis / 1_000);
            state.slot_time(current.saturating_add(1))
        };
        Duration::from_millis(next_slot_time.saturating_mul(1_000).saturating_sub(now_millis))
    }

    /// Run until `shutdown` flips to `true` or a critical error occurs
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("[qc-17] Production loop started");

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            self.set_state(LoopState::WaitingForSlot);
            let wait = self.time_to_next_slot();
            debug!("[qc-17] Next slot in {}ms", wait.as_millis());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[qc-17] Shutdown signal received");
                        break Ok(());
                    }
                    continue;
                }
            }

            self.set_state(LoopState::Producing);
            match self.producer.maybe_produce_unit().await {
                Ok(condition) => log_condition(&condition),
                Err(e) if e.is_critical() => {
                    error!("[qc-17] Stopping production: {}", e);
                    break Err(e);
                }
                Err(e) => warn!("[qc-17] Production attempt failed: {}", e),
            }
        };

        self.set_state(LoopState::Idle);
        info!("[qc-17] Production loop stopped");
        outcome
    }

    fn set_state(&self, state: LoopState) {
        *self.loop_state.write() = state;
    }
}

fn log_condition(condition: &ProductionCondition) {
    match condition {
        ProductionCondition::Produced {
            unit_num,
            unit_hash,
            timestamp,
            mediator,
            missed_units,
        } => info!(
            "[qc-17] Produced unit #{} ({:?}) at {} by {}, missed {}",
            unit_num, unit_hash, timestamp, mediator, missed_units
        ),
        ProductionCondition::NotSynced {
            next_slot_time,
            now,
        } => info!(
            "[qc-17] Not producing: chain tip stale (next slot {}, now {})",
            next_slot_time, now
        ),
        ProductionCondition::NotTimeYet {
            next_slot_time,
            now,
        } => debug!(
            "[qc-17] Not time yet: next slot {}, now {}",
            next_slot_time, now
        ),
        ProductionCondition::NotMyTurn {
            slot,
            scheduled_mediator,
        } => debug!("[qc-17] Slot {} belongs to {}", slot, scheduled_mediator),
        ProductionCondition::NoPrivateKey {
            slot,
            signing_reference,
        } => warn!(
            "[qc-17] Slot {} is ours but key {} is unavailable",
            slot, signing_reference
        ),
        ProductionCondition::Consecutive { slot, mediator } => warn!(
            "[qc-17] Not producing slot {}: {} produced the last unit \
             (set allow_consecutive to override once)",
            slot, mediator
        ),
        ProductionCondition::LowParticipation {
            slot,
            participation_rate,
            required,
        } => warn!(
            "[qc-17] Not producing slot {}: participation {:.2} below {:.2}",
            slot, participation_rate, required
        ),
        ProductionCondition::Lag {
            slot,
            scheduled_time,
            now_millis,
        } => warn!(
            "[qc-17] Lagging: slot {} starts at {}s, woke at {}ms",
            slot, scheduled_time, now_millis
        ),
        ProductionCondition::Failed { slot, error } => {
            warn!("[qc-17] Slot {} failed: {}", slot, error)
        }
    }
}
