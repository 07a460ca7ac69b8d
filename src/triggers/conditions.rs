//! Conditions a message must satisfy for a category to fire.

use chrono::{DateTime, Utc};

use super::matcher;
use super::message::InboundMessage;
use super::rate_limiter::{self, RateLimitPolicy};
use crate::storage::{Category, EventKey, Result, TriggerStore};

/// What a condition may consult besides the message itself.
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    pub store: &'a dyn TriggerStore,
    pub now: DateTime<Utc>,
    /// Category under evaluation, once one has matched.
    pub category_id: Option<i64>,
}

impl<'a> ConditionContext<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TriggerStore, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            category_id: None,
        }
    }

    #[must_use]
    pub const fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Keyword containment test for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    category: Category,
}

impl KeywordMatch {
    #[must_use]
    pub fn for_category(category: &Category) -> Self {
        Self {
            category: category.clone(),
        }
    }

    #[must_use]
    pub fn check(&self, message: &InboundMessage) -> bool {
        message
            .text_content()
            .is_some_and(|text| matcher::matches(text, &self.category))
    }
}

/// Sliding-window count of a user's matches for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTriggerCount {
    pub policy: RateLimitPolicy,
}

impl UserTriggerCount {
    /// Without a category in the context the condition does not hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the event count cannot be read.
    pub async fn check(&self, message: &InboundMessage, context: &ConditionContext<'_>) -> Result<bool> {
        let Some(category_id) = context.category_id else {
            return Ok(false);
        };
        let key = EventKey {
            user_id: message.user_id,
            chat_id: message.chat_id,
            category_id,
        };
        rate_limiter::should_fire(context.store, key, &self.policy, context.now).await
    }
}

/// A check applied to an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    KeywordMatch(KeywordMatch),
    UserTriggerCount(UserTriggerCount),
}

impl Condition {
    /// Evaluates the condition.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage-backed condition cannot be read.
    pub async fn check(&self, message: &InboundMessage, context: &ConditionContext<'_>) -> Result<bool> {
        match self {
            Self::KeywordMatch(condition) => Ok(condition.check(message)),
            Self::UserTriggerCount(condition) => condition.check(message, context).await,
        }
    }
}
