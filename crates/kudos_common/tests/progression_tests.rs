//! End-to-end progression: config to XP engine to the progression store.

use async_trait::async_trait;
use kudos_common::config::KudosConfig;
use kudos_common::progression::{LevelCurve, Title};
use kudos_common::{
    AssetGenerator, AssetTimeouts, GenerationError, GeneratorSet, JsonlProgressionSink,
    MessageEvent, ProgressionApplier, RewardOrchestrator, RewardRegistry, RewardStage,
    RoundContext, RoundId, XpEngine,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn tuned_engine() -> XpEngine {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[progression]
win_bonus = 0
multiplier_cap = 1.5

[[progression.streak_tiers]]
min_streak = 2
multiplier = 1.25
"#
    )
    .unwrap();
    let config = KudosConfig::load(Some(file.path())).unwrap();
    XpEngine::from_config(&config.progression).unwrap()
}

#[test]
fn test_configured_tiers_round_half_up() {
    let engine = tuned_engine();
    // 10 * 1.25 = 12.5 -> 13
    let summary = engine.compute_round_xp(&[MessageEvent::new(10)], true, 2, 0);
    assert_eq!(summary.total_xp_gained, 13);
    assert_eq!(summary.streak_after, 3);

    // Below the first tier
    let summary = engine.compute_round_xp(&[MessageEvent::new(10)], true, 1, 0);
    assert_eq!(summary.total_xp_gained, 10);
}

#[test]
fn test_loss_resets_streak_and_skips_bonus() {
    let engine = XpEngine::default();
    let summary = engine.compute_round_xp(
        &[MessageEvent::new(40), MessageEvent::new(35)],
        false,
        12,
        500,
    );
    assert_eq!(summary.win_xp, 0);
    assert_eq!(summary.total_xp_gained, 75);
    assert_eq!(summary.streak_after, 0);
    assert_eq!(summary.xp_after, 575);
    assert!(!summary.leveled_up());
}

#[test]
fn test_multi_level_jump() {
    let engine = XpEngine::default();
    // 0 -> 1154 XP crosses straight into level 10
    let summary = engine.compute_round_xp(&[MessageEvent::new(1104)], true, 0, 0);
    assert_eq!(summary.total_xp_gained, 1154);
    assert_eq!(summary.level_before, 1);
    assert_eq!(summary.level_after, 10);
    assert_eq!(summary.levels_gained(), 9);
    assert_eq!(summary.progress_after.title(), Title::from_level(10));
}

#[test]
fn test_standard_curve_landmarks() {
    let curve = LevelCurve::standard();
    assert_eq!(curve.xp_for_level(2), 83);
    assert_eq!(curve.xp_for_level(50), 101_333);
    assert_eq!(curve.xp_for_level(92), 6_517_253);
    assert_eq!(curve.xp_for_level(99), 13_034_431);
    assert_eq!(curve.level_for_xp(13_034_430).level, 98);
    assert_eq!(curve.level_for_xp(13_034_431).level, 99);
}

struct Fixed(&'static str);

#[async_trait]
impl AssetGenerator for Fixed {
    async fn generate(&self, _context: &RoundContext) -> Result<String, GenerationError> {
        Ok(self.0.to_string())
    }
}

struct Down;

#[async_trait]
impl AssetGenerator for Down {
    async fn generate(&self, _context: &RoundContext) -> Result<String, GenerationError> {
        Err(GenerationError::Provider("image provider down".into()))
    }
}

#[tokio::test]
async fn test_round_persisted_with_reward() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonlProgressionSink::new(dir.path().join("progression.jsonl")));
    let applier = ProgressionApplier::new(sink.clone());

    let orchestrator = RewardOrchestrator::new(
        Arc::new(RewardRegistry::new(8, Duration::from_secs(60))),
        GeneratorSet::new(
            Arc::new(Fixed("What a comeback.")),
            Arc::new(Fixed("https://cdn/v.mp3")),
            Arc::new(Down),
        ),
        AssetTimeouts::default(),
    );

    let context = RoundContext {
        user_id: "u7".into(),
        persona: "pirate".into(),
        won: true,
        transcript: vec![],
        score: Some(88),
        locale: None,
    };
    let round_id = RoundId::parse("round-77").unwrap();
    let xp = XpEngine::default().compute_round_xp(&[MessageEvent::new(120)], true, 5, 980);
    let handle = orchestrator.start(round_id.clone(), context).await.unwrap();

    let record = applier.apply_when_ready(xp, handle).await.unwrap();
    assert_eq!(record.round_id, round_id);

    let stored = sink.read_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].xp.total_xp_gained, 204);
    let reward = stored[0].reward.as_ref().unwrap();
    assert_eq!(reward.stage, RewardStage::Partial);
    assert_eq!(reward.reward_text.as_deref(), Some("What a comeback."));
    assert_eq!(reward.reward_voice_url.as_deref(), Some("https://cdn/v.mp3"));
    assert!(reward.reward_image_url.is_none());
}
