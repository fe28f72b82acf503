//! Progression Module
//!
//! RPG-style leveling for users: XP from finished rounds, an OSRS-shaped level
//! curve, rank titles and win-streak multipliers.
//!
//! ## Level System
//!
//! - Levels 1-99, precomputed threshold table shared read-only
//! - Titles based on level bands
//!
//! ## Round XP
//!
//! - Message XP (scored upstream) plus a flat win bonus
//! - Scaled by a tiered, capped streak multiplier that resets on a loss
//! - Rounded half-up to whole XP

pub mod levels;
pub mod streak;
pub mod xp;

pub use levels::{LevelCurve, LevelProgress, Title, TITLE_BANDS};
pub use streak::{next_streak, StreakMultiplier, StreakTier, StreakTiers};
pub use xp::{MessageEvent, RoundXpSummary, XpEngine};
