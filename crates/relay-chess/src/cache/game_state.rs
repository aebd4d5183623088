use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheError, KeyValueStore};
use crate::config::ClientConfig;
use crate::types::chess::Position;
use crate::types::game::GameId;

/// Last known state of a game, kept for instant display on reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedGameState {
    pub game_id: GameId,
    pub fen: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// When `last_move` was played, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move_time: Option<i64>,
}

/// Per-game position cache.
pub struct GameStateCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl GameStateCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &ClientConfig) -> Self {
        Self {
            store,
            prefix: config.game_cache_prefix.clone(),
            ttl: config.game_state_ttl,
        }
    }

    fn key(&self, game_id: &GameId) -> String {
        format!("{}{}", self.prefix, game_id)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn save(
        &self,
        game_id: &GameId,
        position: &Position,
        last_move: Option<&str>,
    ) -> Result<CachedGameState, CacheError> {
        let now = Utc::now().timestamp_millis();
        let cached = CachedGameState {
            game_id: game_id.clone(),
            fen: position.clone(),
            last_move: last_move.map(str::to_string),
            timestamp: now,
            last_move_time: last_move.map(|_| now),
        };
        let value = serde_json::to_string(&cached)?;
        self.store.save(&self.key(game_id), value, self.ttl).await?;
        debug!(%game_id, "cached game state");
        Ok(cached)
    }

    /// Cached state of `game_id`. Unreadable entries are deleted and
    /// reported as absent.
    pub async fn load(&self, game_id: &GameId) -> Result<Option<CachedGameState>, CacheError> {
        let key = self.key(game_id);
        let Some(raw) = self.store.load(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!(%game_id, error = %e, "dropping corrupt game cache entry");
                self.store.clear(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn clear(&self, game_id: &GameId) -> Result<(), CacheError> {
        self.store.clear(&self.key(game_id)).await
    }

    /// Ids of every cached game.
    pub async fn cached_game_ids(&self) -> Result<Vec<GameId>, CacheError> {
        Ok(self
            .store
            .list_keys(&self.prefix)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.prefix).map(GameId::new))
            .collect())
    }

    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.store.purge_expired(&self.prefix).await
    }
}
