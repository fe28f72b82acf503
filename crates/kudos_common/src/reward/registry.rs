//! Reward status registry.
//!
//! Keyed store of in-flight and finished reward generations. The outer map lock
//! is only held to find or insert an entry; each round carries its own lock, so
//! writers of different rounds never wait on each other and readers always get
//! a whole snapshot of one round.

use crate::config::RewardConfig;
use crate::error::RewardError;
use crate::reward::types::{
    AssetKind, AssetUpdate, RewardGenerationResult, RewardStatus, RoundId, UpdateOutcome,
};
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

type Entry = Arc<RwLock<RewardStatus>>;

/// Attempts `create` makes when concurrent writers keep beating its eviction plan
const CREATE_ATTEMPTS: usize = 3;

/// Bounded, retention-aware registry of reward statuses
pub struct RewardRegistry {
    entries: RwLock<LruCache<RoundId, Entry>>,
    capacity: usize,
    retention: Duration,
    next_generation: AtomicU64,
}

/// Entries chosen for eviction, pinned to the exact entry seen during the scan
#[derive(Default)]
struct EvictionPlan {
    scanned: bool,
    expired: Vec<(RoundId, Entry)>,
    oldest_terminal: Option<(RoundId, Entry)>,
}

impl EvictionPlan {
    fn has_candidates(&self) -> bool {
        !self.expired.is_empty() || self.oldest_terminal.is_some()
    }
}

/// Pop `id` only while it still maps to `entry`
fn pop_if_same(entries: &mut LruCache<RoundId, Entry>, id: &RoundId, entry: &Entry) -> bool {
    let same = entries
        .peek(id)
        .map_or(false, |current| Arc::ptr_eq(current, entry));
    if same {
        entries.pop(id);
    }
    same
}

impl RewardRegistry {
    /// Create a registry
    ///
    /// * `capacity` - Maximum number of rounds tracked at once
    /// * `retention` - How long a terminal round stays readable
    pub fn new(capacity: usize, retention: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(cap)),
            capacity: cap.get(),
            retention,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &RewardConfig) -> Self {
        Self::new(
            config.registry_capacity,
            Duration::from_secs(config.retention_secs),
        )
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn is_expired(&self, status: &RewardStatus, now: DateTime<Utc>) -> bool {
        match status.terminal_at {
            Some(terminal_at) => now
                .signed_duration_since(terminal_at)
                .to_std()
                .map(|age| age >= self.retention)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Register a new round in `pending`. The returned status carries the
    /// run's `generation`, which every later update must present.
    pub async fn create(&self, round_id: &RoundId) -> Result<RewardStatus, RewardError> {
        let now = Utc::now();

        for _ in 0..CREATE_ATTEMPTS {
            let plan = if self.len().await >= self.capacity {
                self.plan_eviction(now).await
            } else {
                EvictionPlan::default()
            };

            let mut entries = self.entries.write().await;

            if let Some(existing) = entries.peek(round_id).cloned() {
                let current = existing.read().await;
                if !self.is_expired(&current, now) {
                    return Err(RewardError::AlreadyExists {
                        round_id: round_id.clone(),
                        in_flight: !current.stage.is_terminal(),
                    });
                }
                drop(current);
                debug!(round_id = %round_id, "Replacing expired reward entry");
                entries.pop(round_id);
            }

            if entries.len() >= self.capacity && !self.apply_eviction(&mut entries, &plan) {
                if plan.scanned && !plan.has_candidates() {
                    return Err(RewardError::RegistryFull {
                        capacity: self.capacity,
                    });
                }
                // Filled up after the scan, or candidates changed under us
                continue;
            }

            let mut status = RewardStatus::new(round_id.clone(), now);
            status.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            entries.put(round_id.clone(), Arc::new(RwLock::new(status.clone())));
            return Ok(status);
        }

        Err(RewardError::RegistryFull {
            capacity: self.capacity,
        })
    }

    /// Snapshot the map under its read lock, then inspect each round without
    /// holding any map lock. Oldest entries come first.
    async fn snapshot(&self) -> Vec<(RoundId, Entry)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Expired entries first, then the oldest terminal one. In-flight rounds
    /// are never candidates.
    async fn plan_eviction(&self, now: DateTime<Utc>) -> EvictionPlan {
        let mut plan = EvictionPlan {
            scanned: true,
            ..Default::default()
        };
        for (id, entry) in self.snapshot().await {
            let status = entry.read().await;
            if self.is_expired(&status, now) {
                drop(status);
                plan.expired.push((id, entry));
            } else if plan.oldest_terminal.is_none() && status.stage.is_terminal() {
                drop(status);
                plan.oldest_terminal = Some((id, entry));
            }
        }
        plan
    }

    /// Returns whether at least one slot was freed
    fn apply_eviction(&self, entries: &mut LruCache<RoundId, Entry>, plan: &EvictionPlan) -> bool {
        let mut freed = 0usize;
        for (id, entry) in &plan.expired {
            if pop_if_same(entries, id, entry) {
                freed += 1;
            }
        }
        if freed == 0 {
            if let Some((id, entry)) = &plan.oldest_terminal {
                if pop_if_same(entries, id, entry) {
                    debug!(round_id = %id, "Evicting oldest finished reward to make room");
                    freed += 1;
                }
            }
        }
        freed > 0
    }

    async fn entry(&self, round_id: &RoundId) -> Result<Entry, RewardError> {
        let entries = self.entries.read().await;
        entries
            .peek(round_id)
            .cloned()
            .ok_or_else(|| RewardError::NotFound(round_id.clone()))
    }

    /// Record progress of one asset of run `generation`
    pub async fn update_asset(
        &self,
        round_id: &RoundId,
        generation: u64,
        kind: AssetKind,
        update: AssetUpdate,
    ) -> Result<UpdateOutcome, RewardError> {
        let entry = self.entry(round_id).await?;
        let mut status = entry.write().await;
        if status.generation != generation {
            return Ok(UpdateOutcome::Superseded);
        }
        let outcome = status.apply(kind, update, Utc::now());
        if let UpdateOutcome::Applied(stage) = outcome {
            if stage.is_terminal() {
                info!(round_id = %round_id, stage = %stage, "Reward reached terminal stage");
            }
        }
        Ok(outcome)
    }

    /// Attach the terminal result assembled at fan-in. A run that was
    /// replaced by a newer one reads as `NotFound`.
    pub async fn finalize(
        &self,
        round_id: &RoundId,
        generation: u64,
        result: RewardGenerationResult,
    ) -> Result<(), RewardError> {
        let entry = self.entry(round_id).await?;
        let mut status = entry.write().await;
        if status.generation != generation {
            return Err(RewardError::NotFound(round_id.clone()));
        }
        status.last_updated_at = Utc::now();
        status.result = Some(result);
        Ok(())
    }

    /// Snapshot of a round's status. Expired rounds read as unknown.
    pub async fn get(&self, round_id: &RoundId) -> Result<RewardStatus, RewardError> {
        let entry = self.entry(round_id).await?;
        let status = entry.read().await.clone();
        if self.is_expired(&status, Utc::now()) {
            return Err(RewardError::NotFound(round_id.clone()));
        }
        Ok(status)
    }

    /// Drop a round. Returns whether it was present.
    pub async fn expire(&self, round_id: &RoundId) -> bool {
        self.entries.write().await.pop(round_id).is_some()
    }

    /// Evict every terminal round older than the retention window
    pub async fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();
        for (id, entry) in self.snapshot().await {
            if self.is_expired(&*entry.read().await, now) {
                expired.push((id, entry));
            }
        }
        if expired.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write().await;
        let mut pruned = 0;
        for (id, entry) in &expired {
            if pop_if_same(&mut entries, id, entry) {
                pruned += 1;
            }
        }
        pruned
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for RewardRegistry {
    fn default() -> Self {
        Self::from_config(&RewardConfig::default())
    }
}
