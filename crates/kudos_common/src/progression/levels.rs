//! Level System
//!
//! Levels 1-99 on the classic OSRS experience curve, precomputed into a table
//! once and shared read-only.
//!
//! ## XP Curve
//!
//! points(L) = sum over n in 1..L of floor(n + 300 * 2^(n / 7))
//! xp(L)     = floor(points(L) / 4)
//!
//! This means:
//! - Level 2: 83 XP
//! - Level 10: 1,154 XP
//! - Level 50: 101,333 XP
//! - Level 99: 13,034,431 XP

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Levels start at 1 with 0 XP
pub const MIN_LEVEL: u32 = 1;

pub const DEFAULT_MAX_LEVEL: u32 = 99;

/// Highest level the formula table may be built for
pub const MAX_SUPPORTED_LEVEL: u32 = 126;

/// Title bands mapping level ranges to rank names
pub const TITLE_BANDS: &[(u32, u32, &str)] = &[
    (1, 9, "Wallflower"),
    (10, 24, "Small Talker"),
    (25, 44, "Conversationalist"),
    (45, 64, "Smooth Talker"),
    (65, 84, "Silver Tongue"),
    (85, 98, "Charmer"),
    (99, MAX_SUPPORTED_LEVEL, "Legend"),
];

static STANDARD_CURVE: Lazy<LevelCurve> = Lazy::new(|| LevelCurve::osrs(DEFAULT_MAX_LEVEL));

/// Title corresponding to a level band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title(String);

impl Title {
    pub fn from_level(level: u32) -> Self {
        for &(min, max, title) in TITLE_BANDS {
            if level >= min && level <= max {
                return Self(title.to_string());
            }
        }
        Self("Unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a given XP total sits on the curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u64,
    /// 0 at max level
    pub xp_to_next: u64,
    /// 0.0 - 100.0; 100.0 at max level
    pub progress_percent: f64,
}

impl LevelProgress {
    pub fn title(&self) -> Title {
        Title::from_level(self.level)
    }
}

/// Monotonic `level -> cumulative XP` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCurve {
    /// thresholds[i] is the XP needed for level i + 1
    thresholds: Vec<u64>,
}

impl LevelCurve {
    /// Build the OSRS curve up to `max_level` (clamped to 2..=126)
    pub fn osrs(max_level: u32) -> Self {
        let max_level = max_level.clamp(2, MAX_SUPPORTED_LEVEL);
        let mut thresholds = Vec::with_capacity(max_level as usize);
        thresholds.push(0);

        let mut points = 0.0f64;
        for n in 1..max_level {
            let n = n as f64;
            points += (n + 300.0 * 2f64.powf(n / 7.0)).floor();
            thresholds.push((points / 4.0).floor() as u64);
        }
        Self { thresholds }
    }

    /// Use a hand-tuned table. Must start at 0 and strictly increase.
    pub fn from_thresholds(thresholds: Vec<u64>) -> Result<Self, ConfigError> {
        if thresholds.len() < 2 {
            return Err(ConfigError::Invalid(
                "level table needs at least two levels".to_string(),
            ));
        }
        if thresholds[0] != 0 {
            return Err(ConfigError::Invalid(
                "level 1 must require 0 XP".to_string(),
            ));
        }
        if let Some(pos) = thresholds.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ConfigError::Invalid(format!(
                "level table not increasing at level {}",
                pos + 2
            )));
        }
        Ok(Self { thresholds })
    }

    /// The default 1-99 curve, built on first use
    pub fn standard() -> &'static LevelCurve {
        &STANDARD_CURVE
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// Cumulative XP needed to reach `level` (clamped into the table)
    pub fn xp_for_level(&self, level: u32) -> u64 {
        let level = level.clamp(MIN_LEVEL, self.max_level());
        self.thresholds[(level - 1) as usize]
    }

    /// Highest level whose requirement is <= `xp`, plus progress within it
    pub fn level_for_xp(&self, xp: u64) -> LevelProgress {
        // thresholds[0] == 0, so at least one entry is <= xp
        let level = self.thresholds.partition_point(|&required| required <= xp) as u32;
        let current = self.xp_for_level(level);
        let xp_into_level = xp - current;

        if level >= self.max_level() {
            return LevelProgress {
                level,
                xp_into_level,
                xp_to_next: 0,
                progress_percent: 100.0,
            };
        }

        let next = self.xp_for_level(level + 1);
        let span = next - current;
        LevelProgress {
            level,
            xp_into_level,
            xp_to_next: next - xp,
            progress_percent: 100.0 * xp_into_level as f64 / span as f64,
        }
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::osrs(DEFAULT_MAX_LEVEL)
    }
}
