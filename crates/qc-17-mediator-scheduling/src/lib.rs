//! # Quantum Chain - Mediator Scheduling (Subsystem 17)
//!
//! **Bounded Context:** DPoS Unit Production
//! **Architecture Compliance:** DDD + Hexagonal + EDA + TDD
//!
//! ## Purpose
//!
//! A fixed committee of mediators takes turns producing verified units in
//! fixed-length time slots. This subsystem decides, from chain state alone:
//! - which slot a wall-clock time falls into
//! - which mediator owns that slot (per-round deterministic shuffle)
//! - whether this node should produce now, and if so builds, signs, stores,
//!   commits and broadcasts the unit
//!
//! ## Key Design Principles
//!
//! 1. **Determinism**: every node derives the same schedule from the same state
//! 2. **Snapshot decisions**: eligibility is decided on one consistent read
//! 3. **Transactional commit**: state changes only after sign + store succeed
//! 4. **Bounded collaborators**: signer and storage calls run under timeouts
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - Ed25519KeyStore, InMemoryUnitStorage             │
//! │  - BroadcastChannelPublisher                        │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: SchedulingQuery                         │
//! │  - Outbound: UnitSigner, UnitStorage,               │
//! │    UnitBroadcaster, TimeSource                      │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - Slot/time mapping                                │
//! │  - MediatorSchedule (xorshift64* shuffle)           │
//! │  - ChainState (unit commit)                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let state = ChainState::genesis(committee, genesis_time, genesis_hash).into_shared();
//! let producer = Arc::new(UnitProducer::new(state, deps)?);
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! ProductionLoop::new(producer).run(shutdown_rx).await?;
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: Pure scheduling logic
//! - [`ports`]: Hexagonal architecture interfaces (inbound/outbound)
//! - [`adapters`]: Key store, storage and broadcast implementations
//! - [`service`]: The unit production pipeline
//! - [`production_loop`]: Per-slot driver with graceful shutdown
//! - [`events`]: Event schemas for EDA

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Key store, storage and broadcast adapters
pub mod adapters;
/// Domain models and business logic
pub mod domain;
/// Event type definitions
pub mod events;
/// Hexagonal architecture ports
pub mod ports;
/// Per-slot production driver
pub mod production_loop;
/// Unit production pipeline
pub mod service;
/// Hashing helpers
pub mod utils;

mod config;
mod error;
mod metrics;

pub use config::SchedulingConfig;
pub use error::{Result, SchedulingError};
pub use metrics::Metrics;

// Re-export commonly used types
pub use domain::{
    ChainParameters, ChainState, CommitSummary, DynamicGlobalProperty, GlobalProperty, Mediator,
    MediatorSchedule, MediatorStats, SharedChainState, VerifiedUnit,
};

pub use ports::{
    ChainTip, SchedulingQuery, SystemTimeSource, TimeSource, UnitBroadcaster, UnitSigner,
    UnitStorage,
};

pub use adapters::{BroadcastChannelPublisher, Ed25519KeyStore, InMemoryUnitStorage};

pub use events::UnitProducedEvent;

pub use production_loop::{LoopState, ProductionLoop};

pub use service::{restore_chain_state, ProducerDependencies, ProductionCondition, UnitProducer};

/// Subsystem identifier for IPC communication
pub const SUBSYSTEM_ID: u8 = 17;

/// Default slot length in seconds
pub const DEFAULT_UNIT_INTERVAL_SECS: u64 = 3;

/// Default distance from the slot start at which production is still allowed
pub const DEFAULT_LAG_TOLERANCE_MS: u64 = 500;
