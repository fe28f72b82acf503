//! Background eviction of expired reward statuses.

use kudos_common::RewardRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Prune expired rounds every `interval`
pub fn spawn_sweeper(registry: Arc<RewardRegistry>, interval: Duration) -> JoinHandle<()> {
    info!("  Status sweeper every {}s", interval.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = registry.prune_expired().await;
            if removed > 0 {
                let remaining = registry.len().await;
                debug!(removed, remaining, "Swept expired rounds");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kudos_common::reward::AssetUpdate;
    use kudos_common::{AssetKind, RoundId};

    #[tokio::test]
    async fn test_sweeper_prunes_expired() {
        let registry = Arc::new(RewardRegistry::new(8, Duration::from_millis(20)));
        let id = RoundId::parse("sweep-me").unwrap();
        let busy = RoundId::parse("still-busy").unwrap();
        let generation = registry.create(&id).await.unwrap().generation;
        registry.create(&busy).await.unwrap();
        registry
            .update_asset(&id, generation, AssetKind::Text, AssetUpdate::Failed("boom".into()))
            .await
            .unwrap();
        assert_eq!(registry.len().await, 2);

        let handle = spawn_sweeper(registry.clone(), Duration::from_millis(15));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_err());
        assert!(registry.get(&busy).await.is_ok());
    }
}
