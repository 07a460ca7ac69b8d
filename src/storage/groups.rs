//! Chat group persistence.

use sqlx::SqlitePool;

use super::error::{Result, StorageError};
use super::models::ChatGroup;

/// Create a group owned by `owner_id`, optionally attaching a first chat.
///
/// Both writes happen in one transaction: if the chat is not registered the
/// group is not created either.
pub async fn create_group(
    pool: &SqlitePool,
    name: &str,
    owner_id: i64,
    chat_id: Option<i64>,
) -> Result<ChatGroup> {
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO chat_groups (name, owner_id)
        VALUES (?, ?)
        "#,
    )
    .bind(name)
    .bind(owner_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if let Some(chat_id) = chat_id {
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET group_id = ?
            WHERE id = ?
            "#,
        )
        .bind(id)
        .bind(chat_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ChatNotFound(chat_id));
        }
    }

    tx.commit().await?;

    tracing::info!(group_id = id, owner_id, ?chat_id, "Group created");
    Ok(ChatGroup {
        id,
        name: name.to_owned(),
        owner_id,
    })
}

/// Get a group by ID.
pub async fn get_group(pool: &SqlitePool, id: i64) -> Result<ChatGroup> {
    sqlx::query_as::<_, ChatGroup>(
        r#"
        SELECT id, name, owner_id
        FROM chat_groups
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StorageError::NotFound {
        entity: "ChatGroup",
        id,
    })
}

/// Get a group, failing unless `user_id` owns it.
pub async fn get_owned_group(pool: &SqlitePool, id: i64, user_id: i64) -> Result<ChatGroup> {
    let group = get_group(pool, id).await?;
    if group.owner_id != user_id {
        tracing::warn!(group_id = id, user_id, "Access to foreign group refused");
        return Err(StorageError::NotOwner {
            group_id: id,
            user_id,
        });
    }
    Ok(group)
}

/// List the groups owned by a user.
pub async fn list_groups_for_owner(pool: &SqlitePool, owner_id: i64) -> Result<Vec<ChatGroup>> {
    let groups = sqlx::query_as::<_, ChatGroup>(
        r#"
        SELECT id, name, owner_id
        FROM chat_groups
        WHERE owner_id = ?
        ORDER BY id
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(groups)
}
