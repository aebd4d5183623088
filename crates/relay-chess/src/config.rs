use crate::error::Error;
use std::time::Duration;

/// Configuration for the client core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a confirmed move stays visible before eviction. Default: 2s.
    pub confirmed_grace: Duration,
    /// How long a failed move stays visible so its error can be read. Default: 5s.
    pub failed_grace: Duration,
    /// Expiry of cached game states. Default: 7 days.
    pub game_state_ttl: Duration,
    /// Expiry of cached profile metadata. Default: 24h.
    pub profile_ttl: Duration,
    /// How often the cache sweeper purges expired entries. Default: 1h.
    pub cache_sweep_interval: Duration,
    /// Key prefix of cached game states. Default: "game_cache_".
    pub game_cache_prefix: String,
    /// Key prefix of cached profiles. Default: "profile_cache_".
    pub profile_cache_prefix: String,
}

impl ClientConfig {
    /// Validate configuration values.
    ///
    /// Durations must be non-zero. Cache prefixes must be non-empty and must
    /// not overlap, otherwise listing one cache would return the other's keys.
    pub fn validate(&self) -> Result<(), Error> {
        let durations = [
            ("confirmed_grace", self.confirmed_grace),
            ("failed_grace", self.failed_grace),
            ("game_state_ttl", self.game_state_ttl),
            ("profile_ttl", self.profile_ttl),
            ("cache_sweep_interval", self.cache_sweep_interval),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::InvalidConfig {
                    reason: format!("{name} must be > 0"),
                });
            }
        }
        if self.game_cache_prefix.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "game_cache_prefix must not be empty".to_string(),
            });
        }
        if self.profile_cache_prefix.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "profile_cache_prefix must not be empty".to_string(),
            });
        }
        if self.game_cache_prefix.starts_with(&self.profile_cache_prefix)
            || self.profile_cache_prefix.starts_with(&self.game_cache_prefix)
        {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "cache prefixes overlap: {:?} and {:?}",
                    self.game_cache_prefix, self.profile_cache_prefix
                ),
            });
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            confirmed_grace: Duration::from_secs(2),
            failed_grace: Duration::from_secs(5),
            game_state_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            profile_ttl: Duration::from_secs(24 * 60 * 60),
            cache_sweep_interval: Duration::from_secs(60 * 60),
            game_cache_prefix: "game_cache_".to_string(),
            profile_cache_prefix: "profile_cache_".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ClientConfig::default();
        assert_eq!(config.confirmed_grace, Duration::from_secs(2));
        assert_eq!(config.failed_grace, Duration::from_secs(5));
        assert_eq!(config.game_state_ttl, Duration::from_secs(604_800));
        assert_eq!(config.profile_ttl, Duration::from_secs(86_400));
        assert_eq!(config.game_cache_prefix, "game_cache_");
        assert_eq!(config.profile_cache_prefix, "profile_cache_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_durations() {
        let config = ClientConfig {
            failed_grace: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("failed_grace"));

        let config = ClientConfig {
            cache_sweep_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_prefixes() {
        let config = ClientConfig {
            game_cache_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            profile_cache_prefix: "game_".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }
}
