use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CacheError, KeyValueStore};
use crate::config::ClientConfig;
use crate::types::game::PlayerKey;

/// Profile metadata (content of a kind 0 event).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud06: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lud16: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Profile {
    /// Parse metadata content. Unparseable content yields an empty profile.
    pub fn from_metadata(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|e| {
            warn!(error = %e, "unparseable profile metadata");
            Self::default()
        })
    }

    /// Best name to show: display name, name, NIP-05 identifier, shortened
    /// key, then "Anonymous".
    pub fn display_label(&self, pubkey: Option<&PlayerKey>) -> String {
        [&self.display_name, &self.name, &self.nip05]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .or_else(|| pubkey.map(|pk| format_pubkey(pk.as_str())))
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Lightning address, preferring `lud16` over `lud06`.
    pub fn lightning_address(&self) -> Option<&str> {
        self.lud16
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.lud06.as_deref().filter(|s| !s.is_empty()))
    }

    /// Has a name of some kind and a picture.
    pub fn is_complete(&self) -> bool {
        let named = [&self.name, &self.display_name]
            .into_iter()
            .flatten()
            .any(|s| !s.is_empty());
        named && self.picture.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Shorten a key to `first8...last8`. Keys under 16 characters are returned
/// unchanged.
pub fn format_pubkey(pubkey: &str) -> String {
    let chars: Vec<char> = pubkey.chars().collect();
    if chars.len() < 16 {
        return pubkey.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}

/// A cached profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub pubkey: PlayerKey,
    pub profile: Profile,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// NIP-05 verification status, when checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// Per-key profile cache.
pub struct ProfileCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &ClientConfig) -> Self {
        Self {
            store,
            prefix: config.profile_cache_prefix.clone(),
            ttl: config.profile_ttl,
        }
    }

    fn key(&self, pubkey: &PlayerKey) -> String {
        format!("{}{}", self.prefix, pubkey)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn save(
        &self,
        pubkey: &PlayerKey,
        profile: Profile,
        verified: Option<bool>,
    ) -> Result<CachedProfile, CacheError> {
        let cached = CachedProfile {
            pubkey: pubkey.clone(),
            profile,
            timestamp: Utc::now().timestamp_millis(),
            verified,
        };
        let value = serde_json::to_string(&cached)?;
        self.store.save(&self.key(pubkey), value, self.ttl).await?;
        Ok(cached)
    }

    /// Cached profile of `pubkey`. Unreadable entries are deleted and
    /// reported as absent.
    pub async fn load(&self, pubkey: &PlayerKey) -> Result<Option<CachedProfile>, CacheError> {
        let key = self.key(pubkey);
        let Some(raw) = self.store.load(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!(%pubkey, error = %e, "dropping corrupt profile cache entry");
                self.store.clear(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn clear(&self, pubkey: &PlayerKey) -> Result<(), CacheError> {
        self.store.clear(&self.key(pubkey)).await
    }

    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.store.purge_expired(&self.prefix).await
    }
}
