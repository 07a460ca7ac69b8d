//! Storage models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::error::{Result, StorageError};

/// A chat where the bot is administratively present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chat {
    /// Platform chat id.
    pub id: i64,
    /// Group this chat is attached to, if any.
    pub group_id: Option<i64>,
    /// Last known chat title.
    pub title: Option<String>,
}

/// An owner-defined collection of chats sharing group categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatGroup {
    pub id: i64,
    pub name: String,
    /// Creator of the group; the only user allowed to manage it.
    pub owner_id: i64,
}

/// A keyword rule with its response text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Normalized, comma-delimited keyword tokens.
    pub keywords: String,
    pub response: String,
    /// Set for local categories.
    pub chat_id: Option<i64>,
    /// Set for group categories.
    pub group_id: Option<i64>,
    /// User who last wrote the category (audit only).
    pub owner_id: Option<i64>,
}

impl Category {
    /// Returns the scope this category belongs to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` if the row does not name exactly one scope.
    pub fn scope(&self) -> Result<CategoryScope> {
        CategoryScope::from_ids(self.chat_id, self.group_id)
    }

    /// Checks whether this is a group-wide category.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Returns the keyword tokens of this category.
    #[must_use]
    pub fn keyword_tokens(&self) -> Vec<String> {
        parse_keywords(&self.keywords)
    }
}

/// Splits a comma-delimited keyword string into lowercase tokens.
///
/// Tokens are trimmed; empty and repeated tokens are dropped, first
/// occurrence order is kept.
#[must_use]
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in raw.split(',') {
        let token = token.trim().to_lowercase();
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Normalizes a keyword string to its stored form.
#[must_use]
pub fn normalize_keywords(raw: &str) -> String {
    parse_keywords(raw).join(",")
}

/// Where a category applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryScope {
    /// Local to a single chat.
    Chat(i64),
    /// Shared by every chat of a group.
    Group(i64),
}

impl CategoryScope {
    /// Builds a scope from the nullable column pair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` unless exactly one id is set.
    pub const fn from_ids(chat_id: Option<i64>, group_id: Option<i64>) -> Result<Self> {
        match (chat_id, group_id) {
            (Some(chat_id), None) => Ok(Self::Chat(chat_id)),
            (None, Some(group_id)) => Ok(Self::Group(group_id)),
            _ => Err(StorageError::InvalidScope { chat_id, group_id }),
        }
    }

    #[must_use]
    pub const fn chat_id(self) -> Option<i64> {
        match self {
            Self::Chat(id) => Some(id),
            Self::Group(_) => None,
        }
    }

    #[must_use]
    pub const fn group_id(self) -> Option<i64> {
        match self {
            Self::Chat(_) => None,
            Self::Group(id) => Some(id),
        }
    }
}

/// Fields of a category write, with its scope still unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub name: String,
    /// Raw comma-delimited keywords as entered.
    pub keywords: String,
    pub response: String,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl CategoryDraft {
    /// Creates a draft for the given scope.
    #[must_use]
    pub fn new(
        scope: CategoryScope,
        name: impl Into<String>,
        keywords: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: scope.chat_id(),
            group_id: scope.group_id(),
            name: name.into(),
            keywords: keywords.into(),
            response: response.into(),
            owner_id: None,
        }
    }

    /// Sets the audit owner.
    #[must_use]
    pub const fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Validates the scope of this draft.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` unless exactly one of chat / group is set.
    pub const fn scope(&self) -> Result<CategoryScope> {
        CategoryScope::from_ids(self.chat_id, self.group_id)
    }
}

/// Key the rate limiter counts events under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub user_id: i64,
    pub chat_id: i64,
    pub category_id: i64,
}

/// A recorded keyword match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TriggerEvent {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub category_id: i64,
    /// UTC Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
}
