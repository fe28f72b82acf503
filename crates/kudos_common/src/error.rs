//! Error types for Kudos.

use crate::reward::types::{AssetKind, RoundId};
use thiserror::Error;

/// Errors surfaced to callers of the registry and orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unknown round: {0}")]
    NotFound(RoundId),

    #[error("Reward for round {round_id} already exists")]
    AlreadyExists { round_id: RoundId, in_flight: bool },

    #[error("Reward generation for round {0} is already in progress")]
    AlreadyInProgress(RoundId),

    #[error("Reward registry is full ({capacity} rounds in flight)")]
    RegistryFull { capacity: usize },

    #[error("Reward task for round {0} aborted before producing a result")]
    Aborted(RoundId),
}

impl RewardError {
    /// HTTP status code the daemon answers with
    pub fn code(&self) -> u16 {
        match self {
            RewardError::Validation(_) => 400,
            RewardError::NotFound(_) => 404,
            RewardError::AlreadyExists { .. } => 409,
            RewardError::AlreadyInProgress(_) => 409,
            RewardError::RegistryFull { .. } => 503,
            RewardError::Aborted(_) => 500,
        }
    }

    /// True for the conflict family (a second start for the same round)
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RewardError::AlreadyExists { .. } | RewardError::AlreadyInProgress(_)
        )
    }
}

/// Failure of a single asset generation. Recorded on the asset, never raised to `start`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("{kind} generation timed out after {timeout_ms}ms")]
    Timeout { kind: AssetKind, timeout_ms: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No {0} generator configured")]
    Unconfigured(AssetKind),

    #[error("Generation task failed: {0}")]
    TaskFailed(String),
}

/// Diagnostics from the XP engine. The engine clamps instead of failing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XpError {
    #[error("Invalid XP input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let id = RoundId::parse("round-1").unwrap();
        assert_eq!(RewardError::Validation("x".into()).code(), 400);
        assert_eq!(RewardError::NotFound(id.clone()).code(), 404);
        assert_eq!(RewardError::AlreadyInProgress(id.clone()).code(), 409);
        assert_eq!(RewardError::RegistryFull { capacity: 1 }.code(), 503);
        assert!(RewardError::AlreadyExists {
            round_id: id,
            in_flight: false
        }
        .is_conflict());
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Timeout {
            kind: AssetKind::Voice,
            timeout_ms: 1500,
        };
        assert_eq!(err.to_string(), "voice generation timed out after 1500ms");
        assert_eq!(
            GenerationError::Unconfigured(AssetKind::Image).to_string(),
            "No image generator configured"
        );
    }
}
