//! Reward Orchestrator
//!
//! Fans a finished round out to the text, voice and image generators. Each
//! generation is its own task with its own timeout and reports straight to the
//! registry; the round task joins all three at a single barrier and then
//! attaches the assembled reward to the status.
//!
//! Text is mandatory. Voice and image are best-effort: their failures are
//! recorded on the asset and never surface to the caller of `start`.

use crate::config::RewardConfig;
use crate::error::{GenerationError, RewardError};
use crate::reward::registry::RewardRegistry;
use crate::reward::types::{
    AssetBreakdown, AssetKind, AssetUpdate, RewardGenerationResult, RewardStage, RoundContext,
    RoundId, UpdateOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

// ============================================================================
// Generator Trait
// ============================================================================

/// An external asset provider
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// Produce the asset: the reward text for `Text`, an asset URL otherwise.
    /// Retries, if any, belong inside the implementation.
    async fn generate(&self, context: &RoundContext) -> Result<String, GenerationError>;
}

/// One generator per asset kind
#[derive(Clone)]
pub struct GeneratorSet {
    pub text: Arc<dyn AssetGenerator>,
    pub voice: Arc<dyn AssetGenerator>,
    pub image: Arc<dyn AssetGenerator>,
}

impl GeneratorSet {
    pub fn new(
        text: Arc<dyn AssetGenerator>,
        voice: Arc<dyn AssetGenerator>,
        image: Arc<dyn AssetGenerator>,
    ) -> Self {
        Self { text, voice, image }
    }

    pub fn get(&self, kind: AssetKind) -> Arc<dyn AssetGenerator> {
        match kind {
            AssetKind::Text => self.text.clone(),
            AssetKind::Voice => self.voice.clone(),
            AssetKind::Image => self.image.clone(),
        }
    }
}

/// Per-asset time bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetTimeouts {
    pub text: Duration,
    pub voice: Duration,
    pub image: Duration,
}

impl AssetTimeouts {
    pub fn from_config(config: &RewardConfig) -> Self {
        Self {
            text: Duration::from_secs(config.text_timeout_secs),
            voice: Duration::from_secs(config.voice_timeout_secs),
            image: Duration::from_secs(config.image_timeout_secs),
        }
    }

    pub fn get(&self, kind: AssetKind) -> Duration {
        match kind {
            AssetKind::Text => self.text,
            AssetKind::Voice => self.voice,
            AssetKind::Image => self.image,
        }
    }
}

impl Default for AssetTimeouts {
    fn default() -> Self {
        Self::from_config(&RewardConfig::default())
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Returned by an accepted `start`. Dropping it does not cancel the round.
#[derive(Debug)]
pub struct RewardHandle {
    round_id: RoundId,
    join: JoinHandle<RewardGenerationResult>,
}

impl RewardHandle {
    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the fan-in and take the assembled reward
    pub async fn wait(self) -> Result<RewardGenerationResult, RewardError> {
        let RewardHandle { round_id, join } = self;
        join.await.map_err(|e| {
            error!(round_id = %round_id, "Reward task aborted: {}", e);
            RewardError::Aborted(round_id)
        })
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct RewardOrchestrator {
    registry: Arc<RewardRegistry>,
    generators: GeneratorSet,
    timeouts: AssetTimeouts,
}

impl RewardOrchestrator {
    pub fn new(registry: Arc<RewardRegistry>, generators: GeneratorSet, timeouts: AssetTimeouts) -> Self {
        Self {
            registry,
            generators,
            timeouts,
        }
    }

    pub fn registry(&self) -> &Arc<RewardRegistry> {
        &self.registry
    }

    /// Accept a round and launch its generations in the background.
    ///
    /// Returns as soon as the registry entry exists. A round already in flight
    /// is rejected with `AlreadyInProgress`; callers should poll instead.
    pub async fn start(
        &self,
        round_id: RoundId,
        context: RoundContext,
    ) -> Result<RewardHandle, RewardError> {
        context.validate()?;

        let created = self.registry.create(&round_id).await.map_err(|e| match e {
            RewardError::AlreadyExists {
                round_id,
                in_flight: true,
            } => RewardError::AlreadyInProgress(round_id),
            other => other,
        })?;

        info!(
            round_id = %round_id,
            generation = created.generation,
            persona = %context.persona,
            "Reward generation accepted"
        );

        let run = RoundRun {
            round_id: round_id.clone(),
            generation: created.generation,
            registry: self.registry.clone(),
            generators: self.generators.clone(),
            timeouts: self.timeouts,
            context: Arc::new(context),
        };
        let join = tokio::spawn(run.run());

        Ok(RewardHandle { round_id, join })
    }
}

/// Result of one generation as seen at the barrier
#[derive(Debug)]
struct AssetOutcome {
    kind: AssetKind,
    result: Result<String, GenerationError>,
    duration_ms: u64,
}

/// Everything one round's background task owns
struct RoundRun {
    round_id: RoundId,
    /// Registry run this task writes to; later runs of the same id ignore it
    generation: u64,
    registry: Arc<RewardRegistry>,
    generators: GeneratorSet,
    timeouts: AssetTimeouts,
    context: Arc<RoundContext>,
}

impl RoundRun {
    async fn run(self) -> RewardGenerationResult {
        let clock = Instant::now();

        let text = self.spawn_asset(AssetKind::Text);
        let voice = self.spawn_asset(AssetKind::Voice);
        let image = self.spawn_asset(AssetKind::Image);

        // Fan-in barrier: no registry lock is held while waiting here
        let (text, voice, image) = tokio::join!(text, voice, image);
        let text = self.settle(AssetKind::Text, text).await;
        let voice = self.settle(AssetKind::Voice, voice).await;
        let image = self.settle(AssetKind::Image, image).await;

        let result = assemble(&text, &voice, &image, clock.elapsed());

        if let Err(e) = self
            .registry
            .finalize(&self.round_id, self.generation, result.clone())
            .await
        {
            warn!(round_id = %self.round_id, "Reward finished after its status was dropped: {}", e);
        }

        info!(
            round_id = %self.round_id,
            stage = %result.stage,
            total_ms = result.generation_time_ms,
            text_ms = result.breakdown.text_ms,
            voice_ms = result.breakdown.voice_ms,
            image_ms = result.breakdown.image_ms,
            "Reward generation finished"
        );
        result
    }

    fn spawn_asset(&self, kind: AssetKind) -> JoinHandle<AssetOutcome> {
        tokio::spawn(generate_asset(
            self.registry.clone(),
            self.round_id.clone(),
            self.generation,
            kind,
            self.generators.get(kind),
            self.timeouts.get(kind),
            self.context.clone(),
        ))
    }

    /// A task that died never reported its own outcome, so report it here
    async fn settle(&self, kind: AssetKind, joined: Result<AssetOutcome, JoinError>) -> AssetOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = GenerationError::TaskFailed(e.to_string());
                error!(round_id = %self.round_id, asset = %kind, "Generation task died: {}", e);
                report(
                    &self.registry,
                    &self.round_id,
                    self.generation,
                    kind,
                    AssetUpdate::Failed(err.to_string()),
                )
                .await;
                AssetOutcome {
                    kind,
                    result: Err(err),
                    duration_ms: 0,
                }
            }
        }
    }
}

async fn generate_asset(
    registry: Arc<RewardRegistry>,
    round_id: RoundId,
    generation: u64,
    kind: AssetKind,
    generator: Arc<dyn AssetGenerator>,
    timeout: Duration,
    context: Arc<RoundContext>,
) -> AssetOutcome {
    report(&registry, &round_id, generation, kind, AssetUpdate::Started).await;

    let clock = Instant::now();
    let result = match tokio::time::timeout(timeout, generator.generate(&context)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout {
            kind,
            timeout_ms: timeout.as_millis() as u64,
        }),
    };
    let duration_ms = clock.elapsed().as_millis() as u64;

    let update = match &result {
        Ok(value) => {
            debug!(round_id = %round_id, asset = %kind, duration_ms, "Asset generated");
            AssetUpdate::Succeeded(value.clone())
        }
        Err(e) if kind.is_mandatory() => {
            error!(round_id = %round_id, asset = %kind, duration_ms, "Mandatory asset failed: {}", e);
            AssetUpdate::Failed(e.to_string())
        }
        Err(e) => {
            warn!(round_id = %round_id, asset = %kind, duration_ms, "Optional asset failed: {}", e);
            AssetUpdate::Failed(e.to_string())
        }
    };
    report(&registry, &round_id, generation, kind, update).await;

    AssetOutcome {
        kind,
        result,
        duration_ms,
    }
}

async fn report(
    registry: &RewardRegistry,
    round_id: &RoundId,
    generation: u64,
    kind: AssetKind,
    update: AssetUpdate,
) {
    match registry.update_asset(round_id, generation, kind, update).await {
        Ok(UpdateOutcome::Applied(stage)) => {
            debug!(round_id = %round_id, asset = %kind, stage = %stage, "Asset update applied");
        }
        Ok(UpdateOutcome::AlreadyTerminal) => {
            debug!(round_id = %round_id, asset = %kind, "Round already terminal, late update dropped");
        }
        Ok(UpdateOutcome::Stale) => {
            warn!(round_id = %round_id, asset = %kind, "Stale asset update ignored");
        }
        Ok(UpdateOutcome::Superseded) => {
            debug!(round_id = %round_id, generation, asset = %kind, "Round restarted, update from earlier run dropped");
        }
        Err(e) => {
            warn!(round_id = %round_id, asset = %kind, "Asset update not recorded: {}", e);
        }
    }
}

/// Build the reward from the three outcomes. Without text there is no reward.
fn assemble(
    text: &AssetOutcome,
    voice: &AssetOutcome,
    image: &AssetOutcome,
    elapsed: Duration,
) -> RewardGenerationResult {
    let mut breakdown = AssetBreakdown::default();
    for outcome in [text, voice, image] {
        breakdown.set(outcome.kind, outcome.duration_ms);
    }
    let generation_time_ms = elapsed.as_millis() as u64;

    let reward_text = match &text.result {
        Ok(reward_text) => reward_text.clone(),
        Err(_) => {
            return RewardGenerationResult {
                stage: RewardStage::Failed,
                reward_text: None,
                reward_voice_url: None,
                reward_image_url: None,
                generation_time_ms,
                breakdown,
            }
        }
    };

    let reward_voice_url = voice.result.as_ref().ok().cloned();
    let reward_image_url = image.result.as_ref().ok().cloned();
    let stage = if reward_voice_url.is_some() && reward_image_url.is_some() {
        RewardStage::Completed
    } else {
        RewardStage::Partial
    };

    RewardGenerationResult {
        stage,
        reward_text: Some(reward_text),
        reward_voice_url,
        reward_image_url,
        generation_time_ms,
        breakdown,
    }
}
