//! Round XP computation.
//!
//! Pure and deterministic: the same inputs always give the same summary.

use crate::config::ProgressionConfig;
use crate::error::{ConfigError, XpError};
use crate::progression::levels::{LevelCurve, LevelProgress};
use crate::progression::streak::{next_streak, StreakTiers};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Flat XP for a won round unless configured otherwise
pub const DEFAULT_WIN_BONUS: u64 = 50;

/// XP earned by one message, scored upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub xp: u64,
}

impl MessageEvent {
    pub fn new(xp: u64) -> Self {
        Self {
            message_id: None,
            xp,
        }
    }
}

/// Everything a round did to a user's progression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundXpSummary {
    pub message_xp_sum: u64,
    pub win_xp: u64,
    pub streak_multiplier: f64,
    pub total_xp_gained: u64,
    pub xp_before: u64,
    pub xp_after: u64,
    pub level_before: u32,
    pub level_after: u32,
    pub streak_before: u32,
    pub streak_after: u32,
    pub progress_after: LevelProgress,
}

impl RoundXpSummary {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }

    pub fn levels_gained(&self) -> u32 {
        self.level_after - self.level_before
    }
}

/// Converts round outcomes into XP and levels
#[derive(Debug, Clone)]
pub struct XpEngine {
    curve: Arc<LevelCurve>,
    tiers: StreakTiers,
    win_bonus: u64,
}

impl XpEngine {
    pub fn new(curve: Arc<LevelCurve>, tiers: StreakTiers, win_bonus: u64) -> Self {
        Self {
            curve,
            tiers,
            win_bonus,
        }
    }

    pub fn from_config(config: &ProgressionConfig) -> Result<Self, ConfigError> {
        let tiers = StreakTiers::new(config.streak_tiers.clone(), config.multiplier_cap)?;
        let curve = Arc::new(LevelCurve::osrs(config.max_level));
        Ok(Self::new(curve, tiers, config.win_bonus))
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn tiers(&self) -> &StreakTiers {
        &self.tiers
    }

    pub fn level_for_xp(&self, xp: u64) -> LevelProgress {
        self.curve.level_for_xp(xp)
    }

    /// Compute the XP summary of one round.
    ///
    /// `xp_before` should never be negative; a negative value is clamped to 0
    /// (and reported as `XpError::InvalidInput` in debug builds).
    pub fn compute_round_xp(
        &self,
        message_events: &[MessageEvent],
        won: bool,
        current_streak: u32,
        xp_before: i64,
    ) -> RoundXpSummary {
        let xp_before = if xp_before < 0 {
            if cfg!(debug_assertions) {
                let err = XpError::InvalidInput(format!("xp_before = {}", xp_before));
                warn!(error = %err, "Clamping negative prior XP to 0");
            }
            0
        } else {
            xp_before as u64
        };

        let message_xp_sum = message_events
            .iter()
            .fold(0u64, |sum, event| sum.saturating_add(event.xp));
        let win_xp = if won { self.win_bonus } else { 0 };
        let multiplier = self.tiers.multiplier(current_streak, won);

        let total_xp_gained = multiplier.apply(message_xp_sum.saturating_add(win_xp));
        let xp_after = xp_before.saturating_add(total_xp_gained);

        let level_before = self.curve.level_for_xp(xp_before).level;
        let progress_after = self.curve.level_for_xp(xp_after);

        RoundXpSummary {
            message_xp_sum,
            win_xp,
            streak_multiplier: multiplier.as_f64(),
            total_xp_gained,
            xp_before,
            xp_after,
            level_before,
            level_after: progress_after.level,
            streak_before: current_streak,
            streak_after: next_streak(current_streak, won),
            progress_after,
        }
    }
}

impl Default for XpEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(LevelCurve::standard().clone()),
            StreakTiers::default(),
            DEFAULT_WIN_BONUS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn events(xps: &[u64]) -> Vec<MessageEvent> {
        xps.iter().map(|&xp| MessageEvent::new(xp)).collect()
    }

    #[test]
    fn test_worked_example() {
        // 120 message XP + 50 win, streak 5 => 1.2x
        let engine = XpEngine::default();
        let summary = engine.compute_round_xp(&events(&[40, 50, 30]), true, 5, 980);

        assert_eq!(summary.message_xp_sum, 120);
        assert_eq!(summary.win_xp, 50);
        assert_relative_eq!(summary.streak_multiplier, 1.2);
        assert_eq!(summary.total_xp_gained, 204);
        assert_eq!(summary.xp_after, 1184);
        assert_eq!(summary.level_before, 9);
        assert_eq!(summary.level_after, 10);
        assert!(summary.leveled_up());
        assert_eq!(summary.streak_after, 6);
    }

    #[test]
    fn test_empty_loss_is_zero() {
        let engine = XpEngine::default();
        let summary = engine.compute_round_xp(&[], false, 4, 500);
        assert_eq!(summary.total_xp_gained, 0);
        assert_eq!(summary.xp_after, 500);
        assert_eq!(summary.level_before, summary.level_after);
        assert_eq!(summary.streak_after, 0);
        assert!(!summary.leveled_up());
    }

    #[test]
    fn test_loss_ignores_streak() {
        let engine = XpEngine::default();
        let summary = engine.compute_round_xp(&events(&[100]), false, 12, 0);
        assert_relative_eq!(summary.streak_multiplier, 1.0);
        assert_eq!(summary.win_xp, 0);
        assert_eq!(summary.total_xp_gained, 100);
    }

    #[test]
    fn test_negative_xp_before_clamped() {
        let engine = XpEngine::default();
        let summary = engine.compute_round_xp(&events(&[10]), false, 0, -250);
        assert_eq!(summary.xp_before, 0);
        assert_eq!(summary.xp_after, 10);
        assert_eq!(summary.level_before, 1);
    }

    #[test]
    fn test_deterministic() {
        let engine = XpEngine::default();
        let input = events(&[12, 7, 33]);
        let a = engine.compute_round_xp(&input, true, 3, 4_000);
        let b = engine.compute_round_xp(&input, true, 3, 4_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_invariants() {
        let engine = XpEngine::default();
        for streak in [0u32, 1, 3, 5, 10, 40] {
            for won in [true, false] {
                for xp_before in [0i64, 82, 1_000, 13_034_000] {
                    let s = engine.compute_round_xp(&events(&[9, 21, 5]), won, streak, xp_before);
                    let expected =
                        ((s.message_xp_sum + s.win_xp) as f64 * s.streak_multiplier).round() as u64;
                    assert_eq!(s.total_xp_gained, expected);
                    assert_eq!(s.xp_after, s.xp_before + s.total_xp_gained);
                    assert_eq!(s.level_after, engine.level_for_xp(s.xp_after).level);
                    assert!(s.level_after >= s.level_before);
                }
            }
        }
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let engine = XpEngine::default();
        let summary = engine.compute_round_xp(&events(&[u64::MAX, 5]), true, 10, i64::MAX);
        assert_eq!(summary.message_xp_sum, u64::MAX);
        assert_eq!(summary.xp_after, u64::MAX);
        assert_eq!(summary.level_after, 99);
    }

    #[test]
    fn test_from_config() {
        let mut config = ProgressionConfig::default();
        config.win_bonus = 10;
        config.max_level = 20;
        let engine = XpEngine::from_config(&config).unwrap();
        let summary = engine.compute_round_xp(&[], true, 0, 10_000_000);
        assert_eq!(summary.win_xp, 10);
        assert_eq!(summary.level_after, 20);
        assert_eq!(summary.progress_after.xp_to_next, 0);
    }
}
