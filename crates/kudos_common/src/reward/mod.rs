//! Reward generation: status model, registry and the three-asset orchestrator.

pub mod orchestrator;
pub mod registry;
pub mod types;

pub use orchestrator::{AssetGenerator, AssetTimeouts, GeneratorSet, RewardHandle, RewardOrchestrator};
pub use registry::RewardRegistry;
pub use types::{
    AssetBreakdown, AssetKind, AssetRecord, AssetSet, AssetState, AssetUpdate, RewardGenerationResult,
    RewardStage, RewardStatus, RoundContext, RoundId, TranscriptLine, UpdateOutcome,
};
