//! Kudos common library - reward generation and progression engine.
//!
//! - `reward`: three-asset reward orchestration and the status registry
//! - `progression`: XP, level curve, streak multipliers
//! - `persist`: boundary to the progression store
//! - `config`: TOML configuration

pub mod config;
pub mod error;
pub mod persist;
pub mod progression;
pub mod reward;

pub use config::KudosConfig;
pub use error::{ConfigError, GenerationError, RewardError, SinkError, XpError};
pub use persist::{
    JsonlProgressionSink, MemoryProgressionSink, ProgressionApplier, ProgressionRecord,
    ProgressionSink,
};
pub use progression::{LevelCurve, LevelProgress, MessageEvent, RoundXpSummary, XpEngine};
pub use reward::{
    AssetGenerator, AssetKind, AssetState, AssetTimeouts, GeneratorSet, RewardGenerationResult,
    RewardHandle, RewardOrchestrator, RewardRegistry, RewardStage, RewardStatus, RoundContext,
    RoundId,
};

/// Crate version, reported by the daemon's health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
