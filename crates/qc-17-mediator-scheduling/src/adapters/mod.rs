//! Adapters implementing the outbound ports for single-process use

pub mod broadcast;
pub mod keystore;
pub mod memory_storage;

pub use broadcast::BroadcastChannelPublisher;
pub use keystore::Ed25519KeyStore;
pub use memory_storage::InMemoryUnitStorage;
