//! Error types for the dungeon queue

use thiserror::Error;

use crate::types::InstanceId;

/// Result type for dungeon queue operations
pub type Result<T> = std::result::Result<T, DungeonError>;

/// Core error type for dungeon queue operations
///
/// Running out of players is not represented here: an instance that can no
/// longer form a party simply terminates.
#[derive(Error, Debug)]
pub enum DungeonError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing, malformed or out-of-range configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Instance id outside the registry
    #[error("Instance {0} not found")]
    InstanceNotFound(InstanceId),

    /// Shared state observed in a state correct locking cannot produce
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Instance task panicked or was aborted
    #[error("Instance {id} failed: {reason}")]
    InstanceFailed { id: InstanceId, reason: String },
}

impl DungeonError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether this error indicates a synchronization bug rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::InstanceFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DungeonError::config("t2 (max time) must be less than or equal to 15");
        assert_eq!(
            err.to_string(),
            "Configuration error: t2 (max time) must be less than or equal to 15"
        );

        let err = DungeonError::InstanceNotFound(InstanceId(3));
        assert_eq!(err.to_string(), "Instance 3 not found");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DungeonError::invariant("dps went negative").is_fatal());
        assert!(
            DungeonError::InstanceFailed {
                id: InstanceId(0),
                reason: "panicked".to_string(),
            }
            .is_fatal()
        );
        assert!(!DungeonError::config("n must be at least 1").is_fatal());
    }
}
