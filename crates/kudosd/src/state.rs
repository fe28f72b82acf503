//! Daemon state shared by all handlers.

use crate::generators::build_generator_set;
use anyhow::Result;
use kudos_common::{
    AssetTimeouts, GeneratorSet, JsonlProgressionSink, KudosConfig, ProgressionApplier,
    RewardOrchestrator, RewardRegistry, XpEngine,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct AppState {
    pub orchestrator: RewardOrchestrator,
    pub xp_engine: Arc<XpEngine>,
    /// None when the progression sink is disabled
    pub applier: Option<ProgressionApplier>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: RewardOrchestrator,
        xp_engine: Arc<XpEngine>,
        applier: Option<ProgressionApplier>,
    ) -> Self {
        Self {
            orchestrator,
            xp_engine,
            applier,
            started_at: Instant::now(),
        }
    }

    /// Wire everything from config
    pub fn from_config(config: &KudosConfig) -> Result<Self> {
        let registry = Arc::new(RewardRegistry::from_config(&config.reward));
        let generators: GeneratorSet = build_generator_set(&config.generators);
        let orchestrator = RewardOrchestrator::new(
            registry,
            generators,
            AssetTimeouts::from_config(&config.reward),
        );
        let xp_engine = Arc::new(XpEngine::from_config(&config.progression)?);

        let applier = if config.sink.enabled {
            info!("  Progression sink: {}", config.sink.jsonl_path);
            Some(ProgressionApplier::new(Arc::new(JsonlProgressionSink::new(
                &config.sink.jsonl_path,
            ))))
        } else {
            info!("  Progression sink disabled");
            None
        };

        Ok(Self::new(orchestrator, xp_engine, applier))
    }

    pub fn registry(&self) -> &Arc<RewardRegistry> {
        self.orchestrator.registry()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Thread-safe shared state handle
pub type SharedState = Arc<AppState>;
