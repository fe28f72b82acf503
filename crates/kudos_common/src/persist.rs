//! Progression persistence boundary.
//!
//! The engine only produces values; a `ProgressionSink` stores them. The JSONL
//! sink appends one record per applied round.

use crate::error::SinkError;
use crate::progression::xp::RoundXpSummary;
use crate::reward::orchestrator::RewardHandle;
use crate::reward::types::{RewardGenerationResult, RoundId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// What gets stored for one finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub round_id: RoundId,
    pub recorded_at: DateTime<Utc>,
    pub xp: RoundXpSummary,
    /// Absent when the reward task aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardGenerationResult>,
}

/// Durable store for progression records
#[async_trait]
pub trait ProgressionSink: Send + Sync {
    /// Store one record. Both values of a round are written together.
    async fn persist(&self, record: &ProgressionRecord) -> Result<(), SinkError>;
}

/// Append-only JSONL file
pub struct JsonlProgressionSink {
    path: PathBuf,
}

impl JsonlProgressionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back (skips malformed lines)
    pub async fn read_all(&self) -> Result<Vec<ProgressionRecord>, SinkError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[async_trait]
impl ProgressionSink for JsonlProgressionSink {
    async fn persist(&self, record: &ProgressionRecord) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // One write per record keeps lines whole under concurrent appends
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemoryProgressionSink {
    records: Mutex<Vec<ProgressionRecord>>,
}

impl MemoryProgressionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ProgressionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ProgressionSink for MemoryProgressionSink {
    async fn persist(&self, record: &ProgressionRecord) -> Result<(), SinkError> {
        // Poisoning cannot leave the Vec half-written
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Hands the engine's outputs for a round to the sink
#[derive(Clone)]
pub struct ProgressionApplier {
    sink: Arc<dyn ProgressionSink>,
}

impl ProgressionApplier {
    pub fn new(sink: Arc<dyn ProgressionSink>) -> Self {
        Self { sink }
    }

    /// Persist a round whose reward is already known
    pub async fn apply(
        &self,
        round_id: RoundId,
        xp: RoundXpSummary,
        reward: Option<RewardGenerationResult>,
    ) -> Result<ProgressionRecord, SinkError> {
        let record = ProgressionRecord {
            round_id,
            recorded_at: Utc::now(),
            xp,
            reward,
        };
        self.sink.persist(&record).await?;
        info!(
            round_id = %record.round_id,
            xp_gained = record.xp.total_xp_gained,
            level = record.xp.level_after,
            "Progression applied"
        );
        Ok(record)
    }

    /// Wait for the reward fan-in, then persist both values together
    pub async fn apply_when_ready(
        &self,
        xp: RoundXpSummary,
        handle: RewardHandle,
    ) -> Result<ProgressionRecord, SinkError> {
        let round_id = handle.round_id().clone();
        let reward = match handle.wait().await {
            Ok(reward) => Some(reward),
            Err(e) => {
                warn!(round_id = %round_id, "Persisting XP without reward: {}", e);
                None
            }
        };
        self.apply(round_id, xp, reward).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::xp::{MessageEvent, XpEngine};
    use crate::reward::types::{AssetBreakdown, RewardStage};

    fn summary() -> RoundXpSummary {
        XpEngine::default().compute_round_xp(&[MessageEvent::new(120)], true, 5, 980)
    }

    fn reward() -> RewardGenerationResult {
        RewardGenerationResult {
            stage: RewardStage::Partial,
            reward_text: Some("Smooth!".into()),
            reward_voice_url: None,
            reward_image_url: Some("https://cdn/img.png".into()),
            generation_time_ms: 3000,
            breakdown: AssetBreakdown {
                text_ms: 2000,
                voice_ms: 3000,
                image_ms: 2900,
            },
        }
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonlProgressionSink::new(dir.path().join("nested/progress.jsonl")));
        let applier = ProgressionApplier::new(sink.clone());

        applier
            .apply(RoundId::parse("r1").unwrap(), summary(), Some(reward()))
            .await
            .unwrap();
        applier
            .apply(RoundId::parse("r2").unwrap(), summary(), None)
            .await
            .unwrap();

        let records = sink.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].round_id.as_str(), "r1");
        assert_eq!(records[0].reward, Some(reward()));
        assert_eq!(records[1].reward, None);
        assert_eq!(records[1].xp.total_xp_gained, 204);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlProgressionSink::new(dir.path().join("absent.jsonl"));
        assert!(sink.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = Arc::new(MemoryProgressionSink::new());
        let applier = ProgressionApplier::new(sink.clone());
        let record = applier
            .apply(RoundId::parse("r9").unwrap(), summary(), Some(reward()))
            .await
            .unwrap();
        assert_eq!(sink.records(), vec![record]);
    }

    #[tokio::test]
    async fn test_memory_sink_survives_poisoned_lock() {
        let sink = Arc::new(MemoryProgressionSink::new());
        let poisoner = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.records.lock().unwrap();
            panic!("holder died");
        })
        .join();
        assert!(sink.records.is_poisoned());

        let applier = ProgressionApplier::new(sink.clone());
        let record = applier
            .apply(RoundId::parse("r10").unwrap(), summary(), None)
            .await
            .unwrap();
        assert_eq!(sink.records(), vec![record]);
    }
}
