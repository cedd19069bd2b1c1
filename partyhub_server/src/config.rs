//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Ephemeral-state TTL applied to every room key
    pub room_ttl: Duration,
    /// Per-game default phase/round durations
    pub game_defaults: GameDefaultsConfig,
}

/// Default durations used when a client doesn't override them
#[derive(Debug, Clone)]
pub struct GameDefaultsConfig {
    /// Quiz round time in seconds, used when a game omits `roundTimeSeconds`
    pub quiz_round_time_secs: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a supplied variable fails to parse.
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| std::env::var("SERVER_BIND").ok().and_then(|s| s.parse().ok()))
            .unwrap_or_else(|| "127.0.0.1:8080".parse().expect("default bind address is valid"));

        let room_ttl_secs: u64 = parse_env_or("ROOM_TTL_SECS", 6 * 60 * 60);
        let quiz_round_time_secs: u32 = parse_env_or("QUIZ_ROUND_TIME_SECS", 120);

        Ok(ServerConfig {
            bind,
            room_ttl: Duration::from_secs(room_ttl_secs),
            game_defaults: GameDefaultsConfig { quiz_round_time_secs },
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                var: "ROOM_TTL_SECS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.game_defaults.quiz_round_time_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "QUIZ_ROUND_TIME_SECS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "FOO".to_string(),
            hint: "set it".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("FOO"));
        assert!(msg.contains("set it"));
    }

    #[test]
    fn test_config_validation_zero_ttl() {
        let config = ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            room_ttl: Duration::from_secs(0),
            game_defaults: GameDefaultsConfig { quiz_round_time_secs: 120 },
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_zero_round_time() {
        let config = ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            room_ttl: Duration::from_secs(60),
            game_defaults: GameDefaultsConfig { quiz_round_time_secs: 0 },
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_passes_with_defaults() {
        let config = ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            room_ttl: Duration::from_secs(21_600),
            game_defaults: GameDefaultsConfig { quiz_round_time_secs: 120 },
        };
        assert!(config.validate().is_ok());
    }
}
