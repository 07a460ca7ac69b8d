//! Updates read from the intake stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::triggers::InboundMessage;

/// The bot's own membership status in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

/// What a membership change means for the chat registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Register,
    Remove,
    Unchanged,
}

impl MembershipStatus {
    #[must_use]
    pub const fn registration(self) -> Registration {
        match self {
            Self::Administrator => Registration::Register,
            Self::Left | Self::Kicked => Registration::Remove,
            Self::Member | Self::Restricted => Registration::Unchanged,
        }
    }
}

/// One line of the intake stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    /// A message in a group chat, or a private message to the bot.
    Message {
        chat_id: i64,
        user_id: i64,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        /// Private messages go to the admin command handler.
        #[serde(default)]
        private: bool,
    },
    /// The bot's status in a chat changed.
    Membership {
        chat_id: i64,
        status: MembershipStatus,
        #[serde(default)]
        title: Option<String>,
    },
}

impl Update {
    /// Parses one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid update.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Handler name used as the trace event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Message { private: false, .. } => "trigger_message",
            Self::Message { private: true, .. } => "admin_message",
            Self::Membership { .. } => "membership",
        }
    }

    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        match self {
            Self::Message { chat_id, .. } | Self::Membership { chat_id, .. } => *chat_id,
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<i64> {
        match self {
            Self::Message { user_id, .. } => Some(*user_id),
            Self::Membership { .. } => None,
        }
    }
}

impl From<InboundMessage> for Update {
    fn from(message: InboundMessage) -> Self {
        Self::Message {
            chat_id: message.chat_id,
            user_id: message.user_id,
            text: message.text,
            timestamp: message.timestamp,
            private: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message() {
        let update =
            Update::from_line(r#"{"type":"message","chat_id":-100,"user_id":7,"text":"hi"}"#).unwrap();
        assert_eq!(update, Update::from(InboundMessage::text(-100, 7, "hi")));
        assert_eq!(update.event_type(), "trigger_message");
        assert_eq!(update.user_id(), Some(7));
    }

    #[test]
    fn test_parse_non_text_message() {
        let update = Update::from_line(r#"{"type":"message","chat_id":-100,"user_id":7}"#).unwrap();
        assert!(matches!(update, Update::Message { text: None, .. }));
    }

    #[test]
    fn test_parse_private_message() {
        let update = Update::from_line(
            r#"{"type":"message","chat_id":7,"user_id":7,"text":"/trig help","private":true}"#,
        )
        .unwrap();
        assert_eq!(update.event_type(), "admin_message");
    }

    #[test]
    fn test_parse_membership() {
        let update = Update::from_line(
            r#"{"type":"membership","chat_id":-100,"status":"administrator","title":"General"}"#,
        )
        .unwrap();
        assert_eq!(
            update,
            Update::Membership {
                chat_id: -100,
                status: MembershipStatus::Administrator,
                title: Some("General".to_owned()),
            }
        );
        assert_eq!(update.user_id(), None);
    }

    #[test]
    fn test_registration() {
        assert_eq!(MembershipStatus::Administrator.registration(), Registration::Register);
        assert_eq!(MembershipStatus::Member.registration(), Registration::Unchanged);
        assert_eq!(MembershipStatus::Kicked.registration(), Registration::Remove);
        assert_eq!(MembershipStatus::Restricted.registration(), Registration::Unchanged);
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Update::from_line(r#"{"type":"poll","chat_id":1}"#).is_err());
        assert!(Update::from_line("not json").is_err());
    }
}
