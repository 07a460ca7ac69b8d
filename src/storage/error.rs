//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The chat is not registered.
    #[error("chat not registered: {0}")]
    ChatNotFound(i64),

    /// A category write did not name exactly one scope.
    #[error("category must belong to exactly one of chat or group (chat_id: {chat_id:?}, group_id: {group_id:?})")]
    InvalidScope {
        chat_id: Option<i64>,
        group_id: Option<i64>,
    },

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The user does not own the group.
    #[error("user {user_id} does not own group {group_id}")]
    NotOwner { group_id: i64, user_id: i64 },
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
