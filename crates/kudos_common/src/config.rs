//! Configuration management for Kudos.
//!
//! Loads settings from /etc/kudos/config.toml, falls back to
//! /var/lib/kudos/config.toml, then to built-in defaults.

use crate::error::ConfigError;
use crate::progression::levels::MAX_SUPPORTED_LEVEL;
use crate::progression::streak::{StreakTier, StreakTiers};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/kudos/config.toml";

/// Fallback config file path
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/kudos/config.toml";

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How often finished rounds past retention are evicted
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_level: default_log_level(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Reward generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Text is mandatory: hitting this fails the whole round
    #[serde(default = "default_text_timeout")]
    pub text_timeout_secs: u64,

    #[serde(default = "default_voice_timeout")]
    pub voice_timeout_secs: u64,

    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,

    /// How long a finished round stays pollable
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// Maximum rounds tracked by the status registry
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
}

fn default_text_timeout() -> u64 {
    20
}

fn default_voice_timeout() -> u64 {
    30
}

fn default_image_timeout() -> u64 {
    45
}

fn default_retention() -> u64 {
    900
}

fn default_registry_capacity() -> usize {
    4096
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            text_timeout_secs: default_text_timeout(),
            voice_timeout_secs: default_voice_timeout(),
            image_timeout_secs: default_image_timeout(),
            retention_secs: default_retention(),
            registry_capacity: default_registry_capacity(),
        }
    }
}

/// Asset provider endpoints. A missing endpoint disables that asset kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub text_endpoint: Option<String>,

    #[serde(default)]
    pub voice_endpoint: Option<String>,

    #[serde(default)]
    pub image_endpoint: Option<String>,

    /// Environment variable holding the provider bearer token
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// XP and level curve settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Flat XP for winning a round
    #[serde(default = "default_win_bonus")]
    pub win_bonus: u64,

    #[serde(default = "default_max_level")]
    pub max_level: u32,

    /// Upper bound for any streak multiplier
    #[serde(default = "default_multiplier_cap")]
    pub multiplier_cap: f64,

    #[serde(default = "default_streak_tiers")]
    pub streak_tiers: Vec<StreakTier>,
}

fn default_win_bonus() -> u64 {
    50
}

fn default_max_level() -> u32 {
    99
}

fn default_multiplier_cap() -> f64 {
    2.0
}

fn default_streak_tiers() -> Vec<StreakTier> {
    vec![
        StreakTier::new(3, 1.1),
        StreakTier::new(5, 1.2),
        StreakTier::new(10, 1.5),
    ]
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            win_bonus: default_win_bonus(),
            max_level: default_max_level(),
            multiplier_cap: default_multiplier_cap(),
            streak_tiers: default_streak_tiers(),
        }
    }
}

/// Where applied progression records go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_enabled")]
    pub enabled: bool,

    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: String,
}

fn default_sink_enabled() -> bool {
    true
}

fn default_jsonl_path() -> String {
    "/var/lib/kudos/progression.jsonl".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: default_sink_enabled(),
            jsonl_path: default_jsonl_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KudosConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub reward: RewardConfig,

    #[serde(default)]
    pub generators: GeneratorConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

impl KudosConfig {
    /// Load from an explicit path, or the standard locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let config = Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                KudosConfig::default()
            });
        config.validate()?;
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: KudosConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.reward;
        if r.text_timeout_secs == 0 || r.voice_timeout_secs == 0 || r.image_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "reward timeouts must be at least 1 second".to_string(),
            ));
        }
        let longest_timeout = r
            .text_timeout_secs
            .max(r.voice_timeout_secs)
            .max(r.image_timeout_secs);
        if r.retention_secs < longest_timeout {
            return Err(ConfigError::Invalid(format!(
                "reward.retention_secs ({}) must cover the longest asset timeout ({}s)",
                r.retention_secs, longest_timeout
            )));
        }
        if r.registry_capacity == 0 {
            return Err(ConfigError::Invalid(
                "reward.registry_capacity must be positive".to_string(),
            ));
        }

        let p = &self.progression;
        if p.max_level < 2 || p.max_level > MAX_SUPPORTED_LEVEL {
            return Err(ConfigError::Invalid(format!(
                "progression.max_level must be within 2..={}",
                MAX_SUPPORTED_LEVEL
            )));
        }
        StreakTiers::new(p.streak_tiers.clone(), p.multiplier_cap)?;

        if self.server.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
