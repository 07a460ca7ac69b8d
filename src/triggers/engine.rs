//! Trigger engine.
//!
//! Every message walks the same path:
//! 1. Non-text messages stop here (no match, nothing written)
//! 2. Unregistered chats stop here, silently
//! 3. The chat's effective categories are resolved (local shadows group)
//! 4. Categories are tried in ascending id order; the first match wins
//! 5. A trigger event is recorded for the match, always before the rate check
//! 6. The rate limiter decides between sending the category response and
//!    staying silent
//!
//! A failed event write aborts the message before anything is sent. A failed
//! send is logged and not retried; the recorded event stays.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::actions::Action;
use super::clock::Clock;
use super::conditions::{Condition, ConditionContext, UserTriggerCount};
use super::delivery::Delivery;
use super::matcher;
use super::message::InboundMessage;
use super::rate_limiter::{RateLimitMode, RateLimitPolicy};
use crate::storage::{EventKey, StorageError, TriggerStore};
use crate::trace::TraceContext;

/// Errors that abort processing of a single message.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Why a message produced no trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// The message has no text.
    NotText,
    /// The bot is not administratively active in the chat.
    UnregisteredChat,
    /// No effective category matched the text.
    NoKeywordMatch,
}

/// Terminal state of a processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoMatch(NoMatchReason),
    /// A category matched and its event was recorded, but the threshold was
    /// not reached.
    Suppressed { category_id: i64 },
    /// The category response was sent (or attempted, see `delivered`).
    Fired {
        category_id: i64,
        chat_id: i64,
        delivered: bool,
    },
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub policy: RateLimitPolicy,
    pub mode: RateLimitMode,
}

/// Keyword trigger engine.
///
/// Holds only handles to its collaborators, so clones are cheap and can be
/// moved into per-message tasks.
#[derive(Clone)]
pub struct TriggerEngine {
    store: Arc<dyn TriggerStore>,
    delivery: Arc<dyn Delivery>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl TriggerEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn TriggerStore>,
        delivery: Arc<dyn Delivery>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            clock,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes a message, logging instead of returning failures.
    ///
    /// Returns `None` when processing was aborted by an error.
    pub async fn handle(&self, message: &InboundMessage, trace: &TraceContext) -> Option<Outcome> {
        match self.process(message, trace).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(trace_id = %trace.trace_id, "Failed to process message: {}", e);
                None
            }
        }
    }

    /// Runs a message through matching, event recording and rate limiting.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Storage` if category lookup or event recording
    /// fails. Nothing is sent in that case.
    pub async fn process(
        &self,
        message: &InboundMessage,
        trace: &TraceContext,
    ) -> Result<Outcome, TriggerError> {
        let Some(text) = message.text_content() else {
            return Ok(Outcome::NoMatch(NoMatchReason::NotText));
        };

        let Some(chat) = self.store.find_chat(message.chat_id).await? else {
            debug!(
                trace_id = %trace.trace_id,
                chat_id = message.chat_id,
                "Message from unregistered chat, skipping"
            );
            return Ok(Outcome::NoMatch(NoMatchReason::UnregisteredChat));
        };

        let categories = self.store.effective_categories_for(&chat).await?;
        let now = self.clock.now();
        let context = ConditionContext::new(self.store.as_ref(), now);

        let Some(category) = matcher::first_match(text, &categories) else {
            return Ok(Outcome::NoMatch(NoMatchReason::NoKeywordMatch));
        };

        debug!(
            trace_id = %trace.trace_id,
            category_id = category.id,
            category = %category.name,
            text_len = text.len(),
            "Keyword matched"
        );

        let key = EventKey {
            user_id: message.user_id,
            chat_id: message.chat_id,
            category_id: category.id,
        };
        let fire = match self.config.mode {
            RateLimitMode::BestEffort => {
                self.store.record_event(key, now).await?;
                let condition = Condition::UserTriggerCount(UserTriggerCount {
                    policy: self.config.policy,
                });
                condition
                    .check(message, &context.with_category(category.id))
                    .await?
            }
            RateLimitMode::Strict => {
                let since = self.config.policy.window_start(now);
                let (_, count) = self.store.record_and_count(key, now, since).await?;
                self.config.policy.is_met(count)
            }
        };

        if !fire {
            return Ok(Outcome::Suppressed {
                category_id: category.id,
            });
        }

        let action = Action::send_message(category.response.clone());
        let delivered = match action.execute(message, self.delivery.as_ref()).await {
            Ok(()) => {
                info!(
                    trace_id = %trace.trace_id,
                    category_id = category.id,
                    category = %category.name,
                    "Category fired"
                );
                true
            }
            Err(e) => {
                warn!(
                    trace_id = %trace.trace_id,
                    category_id = category.id,
                    "Failed to deliver category response: {}",
                    e
                );
                false
            }
        };

        Ok(Outcome::Fired {
            category_id: category.id,
            chat_id: message.chat_id,
            delivered,
        })
    }
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::storage::{
        categories, chats, events, test_database, Category, CategoryDraft, CategoryScope, Chat,
        Database, TriggerEvent,
    };
    use crate::triggers::clock::ManualClock;
    use crate::triggers::delivery::{MemoryDelivery, SentMessage};

    const CHAT: i64 = -100;
    const USER: i64 = 42;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    struct Harness {
        db: Database,
        delivery: Arc<MemoryDelivery>,
        clock: Arc<ManualClock>,
        engine: TriggerEngine,
    }

    async fn harness(config: EngineConfig) -> Harness {
        let db = test_database().await;
        let delivery = Arc::new(MemoryDelivery::new());
        let clock = Arc::new(ManualClock::new(start()));
        let engine = TriggerEngine::new(
            Arc::new(db.clone()),
            delivery.clone(),
            clock.clone(),
            config,
        );
        Harness {
            db,
            delivery,
            clock,
            engine,
        }
    }

    async fn local(db: &Database, name: &str, keywords: &str, response: &str) -> Category {
        let draft = CategoryDraft::new(CategoryScope::Chat(CHAT), name, keywords, response);
        categories::upsert_category(db.pool(), None, &draft).await.unwrap()
    }

    async fn event_count(db: &Database) -> i64 {
        events::count_events(db.pool()).await.unwrap()
    }

    fn trace() -> TraceContext {
        TraceContext::new("test")
    }

    #[tokio::test]
    async fn test_non_text_message_has_no_side_effects() {
        let h = harness(EngineConfig::default()).await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        local(&h.db, "Any", "a", "R").await;

        let message = InboundMessage {
            chat_id: CHAT,
            user_id: USER,
            text: None,
            timestamp: None,
        };
        let outcome = h.engine.process(&message, &trace()).await.unwrap();

        assert_eq!(outcome, Outcome::NoMatch(NoMatchReason::NotText));
        assert_eq!(event_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn test_unregistered_chat_is_silent() {
        let h = harness(EngineConfig::default()).await;

        let message = InboundMessage::text(CHAT, USER, "Who will be president?");
        for _ in 0..3 {
            let outcome = h.engine.process(&message, &trace()).await.unwrap();
            assert_eq!(outcome, Outcome::NoMatch(NoMatchReason::UnregisteredChat));
        }

        assert_eq!(event_count(&h.db).await, 0);
        assert!(h.delivery.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_fires_on_third_match_within_window() {
        let h = harness(EngineConfig::default()).await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        let politics = local(&h.db, "Politics", "election,president", "R1").await;
        let message = InboundMessage::text(CHAT, USER, "Who will be president?");

        for _ in 0..2 {
            let outcome = h.engine.process(&message, &trace()).await.unwrap();
            assert_eq!(outcome, Outcome::Suppressed { category_id: politics.id });
            h.clock.advance(Duration::minutes(2));
        }
        assert!(h.delivery.sent().await.is_empty());

        let outcome = h.engine.process(&message, &trace()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Fired {
                category_id: politics.id,
                chat_id: CHAT,
                delivered: true
            }
        );
        assert_eq!(event_count(&h.db).await, 3);
        assert_eq!(
            h.delivery.sent().await,
            vec![SentMessage {
                chat_id: CHAT,
                text: "R1".to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn test_old_events_fall_out_of_window() {
        let h = harness(EngineConfig::default()).await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        let politics = local(&h.db, "Politics", "election", "R1").await;
        let message = InboundMessage::text(CHAT, USER, "election day");

        h.engine.process(&message, &trace()).await.unwrap();
        h.clock.advance(Duration::minutes(11));
        h.engine.process(&message, &trace()).await.unwrap();
        let outcome = h.engine.process(&message, &trace()).await.unwrap();

        assert_eq!(outcome, Outcome::Suppressed { category_id: politics.id });
        assert!(h.delivery.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_match_wins_single_event() {
        let h = harness(EngineConfig {
            policy: RateLimitPolicy::new(1, 10),
            ..EngineConfig::default()
        })
        .await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        let first = local(&h.db, "First", "vote", "A").await;
        local(&h.db, "Second", "vote", "B").await;

        let outcome = h
            .engine
            .process(&InboundMessage::text(CHAT, USER, "go vote"), &trace())
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Fired { category_id, .. } if category_id == first.id));
        assert_eq!(event_count(&h.db).await, 1);
        assert_eq!(h.delivery.sent().await.len(), 1);
        assert_eq!(h.delivery.sent().await[0].text, "A");
    }

    #[tokio::test]
    async fn test_no_keyword_match_records_nothing() {
        let h = harness(EngineConfig::default()).await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        local(&h.db, "Politics", "election", "R1").await;

        let outcome = h
            .engine
            .process(&InboundMessage::text(CHAT, USER, "nice weather"), &trace())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::NoMatch(NoMatchReason::NoKeywordMatch));
        assert_eq!(event_count(&h.db).await, 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_event() {
        let h = harness(EngineConfig {
            policy: RateLimitPolicy::new(1, 10),
            ..EngineConfig::default()
        })
        .await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        let politics = local(&h.db, "Politics", "election", "R1").await;
        h.delivery.set_failing(true);

        let outcome = h
            .engine
            .process(&InboundMessage::text(CHAT, USER, "election"), &trace())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Fired {
                category_id: politics.id,
                chat_id: CHAT,
                delivered: false
            }
        );
        assert_eq!(event_count(&h.db).await, 1);
    }

    #[tokio::test]
    async fn test_strict_mode_fires_at_threshold() {
        let h = harness(EngineConfig {
            policy: RateLimitPolicy::new(2, 10),
            mode: RateLimitMode::Strict,
        })
        .await;
        chats::register_chat(h.db.pool(), CHAT, None).await.unwrap();
        local(&h.db, "Politics", "election", "R1").await;
        let message = InboundMessage::text(CHAT, USER, "election");

        let first = h.engine.process(&message, &trace()).await.unwrap();
        let second = h.engine.process(&message, &trace()).await.unwrap();

        assert!(matches!(first, Outcome::Suppressed { .. }));
        assert!(matches!(second, Outcome::Fired { delivered: true, .. }));
    }

    /// Store whose event writes always fail.
    struct BrokenEvents(Database);

    #[async_trait]
    impl TriggerStore for BrokenEvents {
        async fn find_chat(&self, chat_id: i64) -> crate::storage::Result<Option<Chat>> {
            self.0.find_chat(chat_id).await
        }

        async fn chat_categories(&self, chat_id: i64) -> crate::storage::Result<Vec<Category>> {
            self.0.chat_categories(chat_id).await
        }

        async fn group_categories(&self, group_id: i64) -> crate::storage::Result<Vec<Category>> {
            self.0.group_categories(group_id).await
        }

        async fn record_event(
            &self,
            _key: EventKey,
            _at: DateTime<Utc>,
        ) -> crate::storage::Result<TriggerEvent> {
            Err(StorageError::Sqlx(sqlx::Error::PoolClosed))
        }

        async fn count_events_since(
            &self,
            key: EventKey,
            since: DateTime<Utc>,
        ) -> crate::storage::Result<i64> {
            self.0.count_events_since(key, since).await
        }
    }

    #[tokio::test]
    async fn test_event_write_failure_sends_nothing() {
        let db = test_database().await;
        chats::register_chat(db.pool(), CHAT, None).await.unwrap();
        local(&db, "Politics", "election", "R1").await;

        let delivery = Arc::new(MemoryDelivery::new());
        let engine = TriggerEngine::new(
            Arc::new(BrokenEvents(db.clone())),
            delivery.clone(),
            Arc::new(ManualClock::new(start())),
            EngineConfig {
                policy: RateLimitPolicy::new(1, 10),
                ..EngineConfig::default()
            },
        );
        let message = InboundMessage::text(CHAT, USER, "election");

        let result = engine.process(&message, &trace()).await;
        assert!(matches!(result, Err(TriggerError::Storage(_))));
        assert!(engine.handle(&message, &trace()).await.is_none());
        assert!(delivery.sent().await.is_empty());
    }
}
