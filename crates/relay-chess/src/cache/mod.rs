//! Expiring local persistence.
//!
//! A [`KeyValueStore`] keeps string values under string keys until their TTL
//! runs out. Expired entries are dropped lazily by `load` and eagerly by
//! `purge_expired`, which [`CacheSweeper`] calls periodically.
//! [`GameStateCache`] and [`ProfileCache`] store typed JSON records on top.

pub mod game_state;
pub mod memory;
pub mod profile;
pub mod sweeper;

pub use game_state::{CachedGameState, GameStateCache};
pub use memory::MemoryStore;
pub use profile::{format_pubkey, CachedProfile, Profile, ProfileCache};
pub use sweeper::CacheSweeper;

use std::time::Duration;

use async_trait::async_trait;

/// Errors from the local cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache value could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {reason}")]
    Backend {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// A string key-value store whose entries expire.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Value under `key`, or `None` if absent or expired.
    async fn load(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn clear(&self, key: &str) -> Result<(), CacheError>;

    /// Every stored key starting with `prefix`, expired or not.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Delete expired entries under `prefix`. Returns how many were deleted.
    async fn purge_expired(&self, prefix: &str) -> Result<usize, CacheError>;
}
