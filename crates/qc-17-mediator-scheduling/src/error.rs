//! Error types for mediator scheduling

use thiserror::Error;

/// Result type alias for scheduling operations
pub type Result<T> = std::result::Result<T, SchedulingError>;

/// Errors that can occur while scheduling or producing units
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Committee has no active mediators
    #[error("Active mediator set is empty")]
    EmptyCommittee,

    /// Same mediator listed twice in the committee
    #[error("Duplicate mediator in active set: {0}")]
    DuplicateMediator(String),

    /// Schedule queried without any mediators
    #[error("Mediator schedule is empty")]
    EmptySchedule,

    /// Unit does not extend the current tip
    #[error("Stale state: expected unit #{expected}, got #{actual}")]
    StaleState {
        /// Unit number the tip expects next
        expected: u64,
        /// Unit number that was offered
        actual: u64,
    },

    /// Scheduling invariant broken
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Signer did not answer in time
    #[error("Signer timed out after {timeout_ms}ms")]
    SignerTimeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Signer failed
    #[error("Signature error: {0}")]
    SignerError(String),

    /// Storage did not answer in time
    #[error("Storage timed out after {timeout_ms}ms")]
    StorageTimeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Storage append or load failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Chain state moved on while the unit was being signed
    #[error("Schedule changed during production: {0}")]
    ScheduleChanged(String),

    /// Broadcast failed
    #[error("Broadcast error: {0}")]
    BroadcastError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SchedulingError {
    /// Check if error only costs the current slot (skip and retry next slot)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SignerTimeout { .. }
                | Self::SignerError(_)
                | Self::StorageTimeout { .. }
                | Self::StorageError(_)
                | Self::ScheduleChanged(_)
                | Self::BroadcastError(_)
        )
    }

    /// Check if error is critical (should stop production)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::EmptyCommittee
                | Self::DuplicateMediator(_)
                | Self::EmptySchedule
                | Self::StaleState { .. }
                | Self::InvariantViolation(_)
        )
    }
}

impl From<serde_json::Error> for SchedulingError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
