//! Win-streak multiplier.
//!
//! Tiers map a minimum streak to a multiplier. Multipliers are kept in basis
//! points so XP rounding is exact integer arithmetic.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 1.0x in basis points
pub const BASIS_POINTS: u32 = 10_000;

/// One configured step: from `min_streak` wins in a row, apply `multiplier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakTier {
    pub min_streak: u32,
    pub multiplier: f64,
}

impl StreakTier {
    pub fn new(min_streak: u32, multiplier: f64) -> Self {
        Self {
            min_streak,
            multiplier,
        }
    }
}

/// A multiplier in basis points (10_000 == 1.0x)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreakMultiplier(u32);

impl StreakMultiplier {
    pub const BASELINE: StreakMultiplier = StreakMultiplier(BASIS_POINTS);

    pub fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    fn from_f64(value: f64) -> Self {
        Self((value * BASIS_POINTS as f64).round() as u32)
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / BASIS_POINTS as f64
    }

    /// `round_half_up(base * multiplier)`
    pub fn apply(&self, base: u64) -> u64 {
        let scaled = base as u128 * self.0 as u128 + (BASIS_POINTS / 2) as u128;
        u64::try_from(scaled / BASIS_POINTS as u128).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for StreakMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.as_f64())
    }
}

/// Validated tier table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakTiers {
    /// (min_streak, multiplier), ascending in both
    tiers: Vec<(u32, StreakMultiplier)>,
    cap: StreakMultiplier,
}

impl StreakTiers {
    /// Build a table. Rejects tiers that would break:
    /// multiplier(0) == 1.0, non-decreasing in streak, never above `cap`.
    pub fn new(tiers: Vec<StreakTier>, cap: f64) -> Result<Self, ConfigError> {
        if !cap.is_finite() || cap < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "multiplier cap {} must be >= 1.0",
                cap
            )));
        }
        let cap = StreakMultiplier::from_f64(cap);

        let mut table: Vec<(u32, StreakMultiplier)> = Vec::with_capacity(tiers.len());
        for tier in tiers {
            if !tier.multiplier.is_finite() || tier.multiplier < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "streak tier {} has multiplier {} below 1.0",
                    tier.min_streak, tier.multiplier
                )));
            }
            let multiplier = StreakMultiplier::from_f64(tier.multiplier);
            if multiplier > cap {
                return Err(ConfigError::Invalid(format!(
                    "streak tier {} multiplier {} exceeds cap {}",
                    tier.min_streak, multiplier, cap
                )));
            }
            if tier.min_streak == 0 && multiplier != StreakMultiplier::BASELINE {
                return Err(ConfigError::Invalid(
                    "a zero streak must keep the 1.0 multiplier".to_string(),
                ));
            }
            if let Some(&(prev_streak, prev_mult)) = table.last() {
                if tier.min_streak <= prev_streak {
                    return Err(ConfigError::Invalid(format!(
                        "streak tiers must be strictly ascending ({} after {})",
                        tier.min_streak, prev_streak
                    )));
                }
                if multiplier < prev_mult {
                    return Err(ConfigError::Invalid(format!(
                        "streak tier {} lowers the multiplier",
                        tier.min_streak
                    )));
                }
            }
            table.push((tier.min_streak, multiplier));
        }

        Ok(Self { tiers: table, cap })
    }

    pub fn cap(&self) -> StreakMultiplier {
        self.cap
    }

    /// Multiplier for a round. Losing always resets to baseline.
    pub fn multiplier(&self, streak: u32, won: bool) -> StreakMultiplier {
        if !won {
            return StreakMultiplier::BASELINE;
        }
        self.tiers
            .iter()
            .rev()
            .find(|(min_streak, _)| streak >= *min_streak)
            .map(|(_, m)| *m)
            .unwrap_or(StreakMultiplier::BASELINE)
            .min(self.cap)
    }
}

impl Default for StreakTiers {
    fn default() -> Self {
        Self {
            tiers: vec![
                (3, StreakMultiplier(11_000)),
                (5, StreakMultiplier(12_000)),
                (10, StreakMultiplier(15_000)),
            ],
            cap: StreakMultiplier(20_000),
        }
    }
}

/// Streak after a round: one more on a win, back to zero on a loss
pub fn next_streak(current: u32, won: bool) -> u32 {
    if won {
        current.saturating_add(1)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let tiers = StreakTiers::default();
        assert_eq!(tiers.multiplier(0, true), StreakMultiplier::BASELINE);
        assert_eq!(tiers.multiplier(2, true), StreakMultiplier::BASELINE);
        assert_eq!(tiers.multiplier(3, true).basis_points(), 11_000);
        assert_eq!(tiers.multiplier(5, true).basis_points(), 12_000);
        assert_eq!(tiers.multiplier(9, true).basis_points(), 12_000);
        assert_eq!(tiers.multiplier(10, true).basis_points(), 15_000);
        assert_eq!(tiers.multiplier(u32::MAX, true).basis_points(), 15_000);
    }

    #[test]
    fn test_default_matches_config_defaults() {
        let config = crate::config::ProgressionConfig::default();
        let built = StreakTiers::new(config.streak_tiers, config.multiplier_cap).unwrap();
        assert_eq!(built, StreakTiers::default());
    }

    #[test]
    fn test_loss_resets() {
        let tiers = StreakTiers::default();
        for streak in [0, 3, 7, 50] {
            assert_eq!(tiers.multiplier(streak, false), StreakMultiplier::BASELINE);
        }
    }

    #[test]
    fn test_non_decreasing_and_bounded() {
        let tiers = StreakTiers::default();
        let mut prev = StreakMultiplier::BASELINE;
        for streak in 0..200 {
            let m = tiers.multiplier(streak, true);
            assert!(m >= prev, "multiplier dropped at streak {}", streak);
            assert!(m >= StreakMultiplier::BASELINE);
            assert!(m <= tiers.cap());
            prev = m;
        }
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(StreakTiers::new(vec![StreakTier::new(3, 0.9)], 2.0).is_err());
        assert!(StreakTiers::new(vec![StreakTier::new(3, 2.5)], 2.0).is_err());
        assert!(StreakTiers::new(vec![StreakTier::new(0, 1.1)], 2.0).is_err());
        assert!(StreakTiers::new(
            vec![StreakTier::new(5, 1.5), StreakTier::new(3, 1.6)],
            2.0
        )
        .is_err());
        assert!(StreakTiers::new(
            vec![StreakTier::new(3, 1.5), StreakTier::new(5, 1.2)],
            2.0
        )
        .is_err());
        assert!(StreakTiers::new(vec![], 0.5).is_err());
        assert!(StreakTiers::new(vec![StreakTier::new(0, 1.0)], 1.0).is_ok());
    }

    #[test]
    fn test_apply_rounds_half_up() {
        let m = StreakMultiplier::from_basis_points(12_000);
        assert_eq!(m.apply(170), 204);
        let half = StreakMultiplier::from_basis_points(15_000);
        assert_eq!(half.apply(1), 2); // 1.5 -> 2
        assert_eq!(half.apply(3), 5); // 4.5 -> 5
        let eleven = StreakMultiplier::from_basis_points(11_000);
        assert_eq!(eleven.apply(5), 6); // 5.5 -> 6
        assert_eq!(eleven.apply(4), 4); // 4.4 -> 4
        assert_eq!(StreakMultiplier::BASELINE.apply(0), 0);
    }

    #[test]
    fn test_next_streak() {
        assert_eq!(next_streak(0, true), 1);
        assert_eq!(next_streak(7, true), 8);
        assert_eq!(next_streak(7, false), 0);
        assert_eq!(next_streak(u32::MAX, true), u32::MAX);
    }
}
