//! Chat registration and group membership.

use sqlx::SqlitePool;

use super::error::{Result, StorageError};
use super::models::{Chat, ChatGroup};

/// Register a chat, keeping any existing group attachment.
///
/// Calling this for an already registered chat only refreshes the title.
pub async fn register_chat(pool: &SqlitePool, id: i64, title: Option<&str>) -> Result<Chat> {
    sqlx::query(
        r#"
        INSERT INTO chats (id, title)
        VALUES (?, ?)
        ON CONFLICT(id) DO UPDATE SET title = COALESCE(excluded.title, chats.title)
        "#,
    )
    .bind(id)
    .bind(title)
    .execute(pool)
    .await?;

    get_chat(pool, id).await
}

/// Look up a chat, returning `None` when it is not registered.
pub async fn find_chat(pool: &SqlitePool, id: i64) -> Result<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>(
        r#"
        SELECT id, group_id, title
        FROM chats
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(chat)
}

/// Get a registered chat.
pub async fn get_chat(pool: &SqlitePool, id: i64) -> Result<Chat> {
    find_chat(pool, id)
        .await?
        .ok_or(StorageError::ChatNotFound(id))
}

/// Remove a chat. Its local categories are deleted with it.
///
/// Returns `false` if the chat was not registered.
pub async fn remove_chat(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM chats
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List the chats attached to a group.
pub async fn list_group_chats(pool: &SqlitePool, group_id: i64) -> Result<Vec<Chat>> {
    let chats = sqlx::query_as::<_, Chat>(
        r#"
        SELECT id, group_id, title
        FROM chats
        WHERE group_id = ?
        ORDER BY id
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(chats)
}

/// Attach a chat to a group owned by `user_id`.
pub async fn attach_chat(
    pool: &SqlitePool,
    chat_id: i64,
    group_id: i64,
    user_id: i64,
) -> Result<ChatGroup> {
    let group = super::groups::get_owned_group(pool, group_id, user_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE chats
        SET group_id = ?
        WHERE id = ?
        "#,
    )
    .bind(group_id)
    .bind(chat_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::ChatNotFound(chat_id));
    }

    tracing::info!(chat_id, group_id, "Chat attached to group");
    Ok(group)
}

/// Detach a chat from its group, if it has one.
pub async fn detach_chat(pool: &SqlitePool, chat_id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chats
        SET group_id = NULL
        WHERE id = ?
        "#,
    )
    .bind(chat_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::ChatNotFound(chat_id));
    }

    Ok(())
}
