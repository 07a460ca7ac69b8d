//! Per-update trace context.
//!
//! A `TraceContext` is created once for every inbound update and passed by
//! reference to whatever handles it. Its span carries the identifiers that
//! every log line of that update should have.

use tracing::Span;
use uuid::Uuid;

use crate::triggers::InboundMessage;

/// Identifiers attached to the logs of one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: Uuid,
    /// Handler that processes the update, e.g. `trigger_message`.
    pub event_type: &'static str,
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl TraceContext {
    /// Creates a context with a fresh trace id.
    #[must_use]
    pub fn new(event_type: &'static str) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            event_type,
            chat_id: None,
            user_id: None,
        }
    }

    /// Creates a context for a chat message.
    #[must_use]
    pub fn for_message(event_type: &'static str, message: &InboundMessage) -> Self {
        Self::new(event_type)
            .with_chat(message.chat_id)
            .with_user(message.user_id)
    }

    #[must_use]
    pub const fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    #[must_use]
    pub const fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Builds the span the update is processed in.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "update",
            trace_id = %self.trace_id,
            event_type = self.event_type,
            chat_id = ?self.chat_id,
            user_id = ?self.user_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_message_copies_ids() {
        let message = InboundMessage::text(-100, 7, "hello");
        let ctx = TraceContext::for_message("trigger_message", &message);
        assert_eq!(ctx.chat_id, Some(-100));
        assert_eq!(ctx.user_id, Some(7));
        assert_eq!(ctx.event_type, "trigger_message");
    }

    #[test]
    fn test_trace_ids_are_unique() {
        assert_ne!(TraceContext::new("a").trace_id, TraceContext::new("a").trace_id);
    }
}
