//! Sliding-window rate limiting over recorded trigger events.
//!
//! The decision is recomputed from the event history on every check: a
//! category fires for a user once at least `threshold_count` of that user's
//! events for the category and chat fall inside the trailing window. No
//! counter state lives in the process.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{EventKey, Result, TriggerStore};

/// Default number of matches needed before a response is sent.
pub const DEFAULT_THRESHOLD_COUNT: u32 = 3;

/// Default trailing window in minutes.
pub const DEFAULT_WINDOW_MINUTES: u32 = 10;

/// Threshold and window of the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub threshold_count: u32,
    pub window_minutes: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            threshold_count: DEFAULT_THRESHOLD_COUNT,
            window_minutes: DEFAULT_WINDOW_MINUTES,
        }
    }
}

impl RateLimitPolicy {
    #[must_use]
    pub const fn new(threshold_count: u32, window_minutes: u32) -> Self {
        Self {
            threshold_count,
            window_minutes,
        }
    }

    /// Length of the trailing window.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.window_minutes))
    }

    /// Oldest timestamp still inside the window ending at `now` (inclusive).
    #[must_use]
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }

    /// Checks whether a window count reaches the threshold.
    #[must_use]
    pub fn is_met(&self, count: i64) -> bool {
        count >= i64::from(self.threshold_count)
    }
}

/// How the event write and the window count are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Separate write and count. Two concurrent messages for the same key
    /// may both see the other's event and both fire at the threshold.
    #[default]
    BestEffort,
    /// Write and count inside one serialized storage transaction.
    Strict,
}

/// Decides whether the events recorded for `key` reach the policy threshold.
///
/// # Errors
///
/// Returns an error if the event count cannot be read.
pub async fn should_fire(
    store: &dyn TriggerStore,
    key: EventKey,
    policy: &RateLimitPolicy,
    now: DateTime<Utc>,
) -> Result<bool> {
    let count = store.count_events_since(key, policy.window_start(now)).await?;
    let fire = policy.is_met(count);

    debug!(
        user_id = key.user_id,
        chat_id = key.chat_id,
        category_id = key.category_id,
        count,
        threshold = policy.threshold_count,
        fire,
        "Rate limiter evaluated"
    );

    Ok(fire)
}
