//! The storage interface the trigger engine depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::categories::{self, EffectiveCategories};
use super::error::{Result, StorageError};
use super::models::{Category, Chat, EventKey, TriggerEvent};
use super::{chats, events, Database};

/// Persistence operations used while processing a message.
///
/// Every call is an independent unit of work; implementations must not keep
/// per-message state between calls.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// Look up a registered chat.
    async fn find_chat(&self, chat_id: i64) -> Result<Option<Chat>>;

    /// Local categories of a chat, ordered by ID.
    async fn chat_categories(&self, chat_id: i64) -> Result<Vec<Category>>;

    /// Categories of a group, ordered by ID.
    async fn group_categories(&self, group_id: i64) -> Result<Vec<Category>>;

    /// Append a trigger event.
    async fn record_event(&self, key: EventKey, at: DateTime<Utc>) -> Result<TriggerEvent>;

    /// Count events for `key` at or after `since`.
    async fn count_events_since(&self, key: EventKey, since: DateTime<Utc>) -> Result<i64>;

    /// Append an event and count the window as one serialized decision.
    ///
    /// The default runs the two calls back to back without isolation.
    async fn record_and_count(
        &self,
        key: EventKey,
        at: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> Result<(TriggerEvent, i64)> {
        let event = self.record_event(key, at).await?;
        let count = self.count_events_since(key, since).await?;
        Ok((event, count))
    }

    /// Merge a chat's local categories with its group's categories.
    async fn effective_categories_for(&self, chat: &Chat) -> Result<EffectiveCategories> {
        let local = self.chat_categories(chat.id).await?;
        let group = match chat.group_id {
            Some(group_id) => self.group_categories(group_id).await?,
            None => Vec::new(),
        };
        Ok(EffectiveCategories::merge(local, group))
    }

    /// Resolve the effective category set of a chat.
    ///
    /// Fails with `ChatNotFound` for unregistered chats.
    async fn resolve_effective_categories(&self, chat_id: i64) -> Result<EffectiveCategories> {
        let chat = self
            .find_chat(chat_id)
            .await?
            .ok_or(StorageError::ChatNotFound(chat_id))?;
        self.effective_categories_for(&chat).await
    }
}

#[async_trait]
impl TriggerStore for Database {
    async fn find_chat(&self, chat_id: i64) -> Result<Option<Chat>> {
        chats::find_chat(self.pool(), chat_id).await
    }

    async fn chat_categories(&self, chat_id: i64) -> Result<Vec<Category>> {
        categories::list_chat_categories(self.pool(), chat_id).await
    }

    async fn group_categories(&self, group_id: i64) -> Result<Vec<Category>> {
        categories::list_group_categories(self.pool(), group_id).await
    }

    async fn record_event(&self, key: EventKey, at: DateTime<Utc>) -> Result<TriggerEvent> {
        events::insert_event(self.pool(), key, at).await
    }

    async fn count_events_since(&self, key: EventKey, since: DateTime<Utc>) -> Result<i64> {
        events::count_events_since(self.pool(), key, since).await
    }

    async fn record_and_count(
        &self,
        key: EventKey,
        at: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> Result<(TriggerEvent, i64)> {
        events::insert_and_count(self.pool(), key, at, since).await
    }
}
