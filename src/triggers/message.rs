//! Inbound message shape consumed by the trigger engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message received in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_id: i64,
    /// Message text; `None` for stickers, media and other non-text messages.
    #[serde(default)]
    pub text: Option<String>,
    /// Platform timestamp, informational only. Trigger events are stamped
    /// with the engine clock.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// Creates a text message.
    #[must_use]
    pub fn text(chat_id: i64, user_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            user_id,
            text: Some(text.into()),
            timestamp: None,
        }
    }

    /// Returns the text if this is a non-empty text message.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}
