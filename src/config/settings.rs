//! Application settings.

use serde::{Deserialize, Serialize};

use crate::triggers::rate_limiter::{DEFAULT_THRESHOLD_COUNT, DEFAULT_WINDOW_MINUTES};
use crate::triggers::{EngineConfig, RateLimitMode, RateLimitPolicy};

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Matches needed within the window before a category responds.
    #[serde(default = "default_threshold_count")]
    pub threshold_count: u32,

    /// Rate-limit window in minutes.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// Serialize event write and window count per decision.
    #[serde(default)]
    pub strict_rate_limit: bool,

    /// Prefix of admin commands sent in private chats.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

fn default_database_url() -> String {
    "sqlite:trigger_bot.db?mode=rwc".to_owned()
}

const fn default_threshold_count() -> u32 {
    DEFAULT_THRESHOLD_COUNT
}

const fn default_window_minutes() -> u32 {
    DEFAULT_WINDOW_MINUTES
}

fn default_command_prefix() -> String {
    "/trig".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            threshold_count: default_threshold_count(),
            window_minutes: default_window_minutes(),
            strict_rate_limit: false,
            command_prefix: default_command_prefix(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    ///
    /// Unparseable numbers fall back to their defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            threshold_count: std::env::var("TRIGGER_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_threshold_count),
            window_minutes: std::env::var("TRIGGER_WINDOW_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_window_minutes),
            strict_rate_limit: std::env::var("TRIGGER_STRICT")
                .ok()
                .is_some_and(|s| parse_flag(&s)),
            command_prefix: std::env::var("ADMIN_COMMAND_PREFIX")
                .unwrap_or_else(|_| default_command_prefix()),
        }
    }

    /// Checks that the rate-limit settings are usable.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero threshold, a zero window or an empty prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: "TRIGGER_THRESHOLD",
                reason: "must be at least 1",
            });
        }
        if self.window_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "TRIGGER_WINDOW_MINUTES",
                reason: "must be at least 1",
            });
        }
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_COMMAND_PREFIX",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    /// Rate-limit policy described by these settings.
    #[must_use]
    pub const fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.threshold_count, self.window_minutes)
    }

    /// Engine configuration described by these settings.
    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            policy: self.rate_limit_policy(),
            mode: if self.strict_rate_limit {
                RateLimitMode::Strict
            } else {
                RateLimitMode::BestEffort
            },
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        reason: &'static str,
    },
}
