//! Reward status model.
//!
//! A round's reward is made of three assets. The round-level `RewardStage` is
//! never stored on its own authority: it is re-derived from the asset states
//! after every update.

use crate::error::RewardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted round id length
pub const MAX_ROUND_ID_LEN: usize = 128;

/// Maximum transcript lines accepted in a round context
pub const MAX_TRANSCRIPT_LINES: usize = 500;

/// Validated round identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoundId(String);

impl RoundId {
    /// Parse a round id: 1-128 chars of `[A-Za-z0-9_:.-]`
    pub fn parse(raw: &str) -> Result<Self, RewardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RewardError::Validation("round id is empty".to_string()));
        }
        if trimmed.len() > MAX_ROUND_ID_LEN {
            return Err(RewardError::Validation(format!(
                "round id longer than {} characters",
                MAX_ROUND_ID_LEN
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')))
        {
            return Err(RewardError::Validation(format!(
                "round id contains invalid character {:?}",
                bad
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoundId {
    type Error = RewardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoundId> for String {
    fn from(id: RoundId) -> Self {
        id.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of the finished conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: String,
    pub text: String,
}

/// Everything the generators get to see about a finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundContext {
    pub user_id: String,
    /// Character the user was talking to
    pub persona: String,
    pub won: bool,
    #[serde(default)]
    pub transcript: Vec<TranscriptLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl RoundContext {
    /// Reject contexts that no generator could work with
    pub fn validate(&self) -> Result<(), RewardError> {
        if self.user_id.trim().is_empty() {
            return Err(RewardError::Validation("context.user_id is empty".to_string()));
        }
        if self.persona.trim().is_empty() {
            return Err(RewardError::Validation("context.persona is empty".to_string()));
        }
        if self.transcript.len() > MAX_TRANSCRIPT_LINES {
            return Err(RewardError::Validation(format!(
                "context.transcript has {} lines (max {})",
                self.transcript.len(),
                MAX_TRANSCRIPT_LINES
            )));
        }
        Ok(())
    }
}

/// The three reward outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Text,
    Voice,
    Image,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Text, AssetKind::Voice, AssetKind::Image];

    /// Text is the only asset a reward cannot do without
    pub fn is_mandatory(&self) -> bool {
        matches!(self, AssetKind::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Text => "text",
            AssetKind::Voice => "voice",
            AssetKind::Image => "image",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    #[default]
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
}

impl AssetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetState::Succeeded | AssetState::Failed)
    }
}

/// Progress of a single asset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetRecord {
    pub state: AssetState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Asset reference (URL) or, for text, the reward text itself
    pub result: Option<String>,
    pub error: Option<String>,
}

impl AssetRecord {
    /// Wall time between start and finish, if both are known
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end
                .signed_duration_since(start)
                .num_milliseconds()
                .try_into()
                .ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetSet {
    pub text: AssetRecord,
    pub voice: AssetRecord,
    pub image: AssetRecord,
}

impl AssetSet {
    pub fn get(&self, kind: AssetKind) -> &AssetRecord {
        match kind {
            AssetKind::Text => &self.text,
            AssetKind::Voice => &self.voice,
            AssetKind::Image => &self.image,
        }
    }

    pub fn get_mut(&mut self, kind: AssetKind) -> &mut AssetRecord {
        match kind {
            AssetKind::Text => &mut self.text,
            AssetKind::Voice => &mut self.voice,
            AssetKind::Image => &mut self.image,
        }
    }
}

/// Round-level stage, derived from the three asset states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStage {
    Pending,
    Generating,
    Partial,
    Completed,
    Failed,
}

impl RewardStage {
    /// Stage table:
    /// - text failed => failed, whatever the optional assets did
    /// - text succeeded, optional assets settled => completed or partial
    /// - nothing started => pending
    /// - anything else => generating
    pub fn derive(assets: &AssetSet) -> Self {
        if assets.text.state == AssetState::Failed {
            return RewardStage::Failed;
        }

        let optional_settled = assets.voice.state.is_terminal() && assets.image.state.is_terminal();
        if assets.text.state == AssetState::Succeeded && optional_settled {
            let all_ok = assets.voice.state == AssetState::Succeeded
                && assets.image.state == AssetState::Succeeded;
            return if all_ok {
                RewardStage::Completed
            } else {
                RewardStage::Partial
            };
        }

        let untouched = AssetKind::ALL
            .iter()
            .all(|k| assets.get(*k).state == AssetState::NotStarted);
        if untouched {
            RewardStage::Pending
        } else {
            RewardStage::Generating
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RewardStage::Partial | RewardStage::Completed | RewardStage::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStage::Pending => "pending",
            RewardStage::Generating => "generating",
            RewardStage::Partial => "partial",
            RewardStage::Completed => "completed",
            RewardStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RewardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asset-level report from the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetUpdate {
    Started,
    Succeeded(String),
    Failed(String),
}

/// What happened to an `AssetUpdate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Update applied; carries the stage derived afterwards
    Applied(RewardStage),
    /// Round already terminal; late result dropped
    AlreadyTerminal,
    /// Update does not fit the asset's current state (e.g. a second finish)
    Stale,
    /// Sender belongs to an earlier run of a round that was started again
    Superseded,
}

/// Per-asset durations of a finished reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetBreakdown {
    pub text_ms: u64,
    pub voice_ms: u64,
    pub image_ms: u64,
}

impl AssetBreakdown {
    pub fn set(&mut self, kind: AssetKind, ms: u64) {
        match kind {
            AssetKind::Text => self.text_ms = ms,
            AssetKind::Voice => self.voice_ms = ms,
            AssetKind::Image => self.image_ms = ms,
        }
    }
}

/// Final reward, produced once at the orchestrator's fan-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGenerationResult {
    pub stage: RewardStage,
    pub reward_text: Option<String>,
    pub reward_voice_url: Option<String>,
    pub reward_image_url: Option<String>,
    pub generation_time_ms: u64,
    pub breakdown: AssetBreakdown,
}

/// Live status of one round's reward generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStatus {
    pub round_id: RoundId,
    /// Run number handed out by the registry; a restarted round gets a new one
    #[serde(default)]
    pub generation: u64,
    pub stage: RewardStage,
    pub assets: AssetSet,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// When the stage became terminal; drives retention
    pub terminal_at: Option<DateTime<Utc>>,
    /// Attached at fan-in, after the stage is terminal
    pub result: Option<RewardGenerationResult>,
}

impl RewardStatus {
    pub fn new(round_id: RoundId, now: DateTime<Utc>) -> Self {
        Self {
            round_id,
            generation: 0,
            stage: RewardStage::Pending,
            assets: AssetSet::default(),
            created_at: now,
            last_updated_at: now,
            terminal_at: None,
            result: None,
        }
    }

    /// Apply one asset update and re-derive the stage
    pub fn apply(&mut self, kind: AssetKind, update: AssetUpdate, now: DateTime<Utc>) -> UpdateOutcome {
        if self.stage.is_terminal() {
            return UpdateOutcome::AlreadyTerminal;
        }

        let record = self.assets.get_mut(kind);
        match (record.state, update) {
            (AssetState::NotStarted, AssetUpdate::Started) => {
                record.state = AssetState::InProgress;
                record.started_at = Some(now);
            }
            (AssetState::NotStarted | AssetState::InProgress, AssetUpdate::Succeeded(result)) => {
                record.state = AssetState::Succeeded;
                record.started_at.get_or_insert(now);
                record.finished_at = Some(now);
                record.result = Some(result);
            }
            (AssetState::NotStarted | AssetState::InProgress, AssetUpdate::Failed(reason)) => {
                record.state = AssetState::Failed;
                record.started_at.get_or_insert(now);
                record.finished_at = Some(now);
                record.error = Some(reason);
            }
            _ => return UpdateOutcome::Stale,
        }

        self.stage = RewardStage::derive(&self.assets);
        self.last_updated_at = now;
        if self.stage.is_terminal() {
            self.terminal_at = Some(now);
        }
        UpdateOutcome::Applied(self.stage)
    }

    /// True once the terminal result has been attached
    pub fn is_settled(&self) -> bool {
        self.result.is_some()
    }
}
