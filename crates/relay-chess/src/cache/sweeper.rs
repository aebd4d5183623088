use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::KeyValueStore;
use crate::config::ClientConfig;

/// Background task that periodically purges expired cache entries.
pub struct CacheSweeper {
    store: Arc<dyn KeyValueStore>,
    prefixes: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
}

impl CacheSweeper {
    /// Sweep the game and profile prefixes of `config`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &ClientConfig, cancel: CancellationToken) -> Self {
        Self {
            store,
            prefixes: vec![
                config.game_cache_prefix.clone(),
                config.profile_cache_prefix.clone(),
            ],
            interval: config.cache_sweep_interval,
            cancel,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the sweep loop until the cancellation token is cancelled.
    ///
    /// Sweeps once immediately, then every `interval`.
    pub async fn run(&self) {
        loop {
            self.sweep_once().await;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Purge every prefix once. A failing prefix is logged and skipped.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> usize {
        let mut total = 0;
        for prefix in &self.prefixes {
            match self.store.purge_expired(prefix).await {
                Ok(purged) => {
                    if purged > 0 {
                        debug!(prefix = %prefix, purged, "purged expired cache entries");
                    }
                    total += purged;
                }
                Err(e) => warn!(prefix = %prefix, error = %e, "cache sweep failed"),
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryStore};
    use async_trait::async_trait;

    fn fast_config() -> ClientConfig {
        ClientConfig {
            cache_sweep_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sweep_once_purges_both_prefixes() {
        let store = Arc::new(MemoryStore::new());
        let short = Duration::from_millis(5);
        store.save("game_cache_a", "{}".into(), short).await.unwrap();
        store.save("profile_cache_b", "{}".into(), short).await.unwrap();
        store.save("unrelated", "{}".into(), short).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        let sweeper = CacheSweeper::new(store.clone(), &fast_config(), CancellationToken::new());
        assert_eq!(sweeper.sweep_once().await, 2);
        assert_eq!(store.list_keys("").await.unwrap(), vec!["unrelated".to_string()]);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let sweeper = Arc::new(CacheSweeper::new(store.clone(), &fast_config(), cancel.clone()));
        let task = tokio::spawn({
            let sweeper = Arc::clone(&sweeper);
            async move { sweeper.run().await }
        });

        store
            .save("game_cache_a", "{}".into(), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.is_empty());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn save(&self, _: &str, _: String, _: Duration) -> Result<(), CacheError> {
            Ok(())
        }
        async fn load(&self, _: &str) -> Result<Option<String>, CacheError> {
            Ok(None)
        }
        async fn clear(&self, _: &str) -> Result<(), CacheError> {
            Ok(())
        }
        async fn list_keys(&self, _: &str) -> Result<Vec<String>, CacheError> {
            Ok(vec![])
        }
        async fn purge_expired(&self, _: &str) -> Result<usize, CacheError> {
            Err(CacheError::Backend {
                reason: "disk full".into(),
                source: None,
            })
        }
    }

    #[tokio::test]
    async fn failing_store_is_skipped() {
        let sweeper = CacheSweeper::new(Arc::new(BrokenStore), &fast_config(), CancellationToken::new());
        assert_eq!(sweeper.sweep_once().await, 0);
    }
}
