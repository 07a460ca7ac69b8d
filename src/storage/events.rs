//! Trigger event history.
//!
//! Events are only ever appended by the trigger engine; the rate limiter
//! reads them through window-bounded counts.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use super::error::Result;
use super::models::{EventKey, TriggerEvent};

/// Append an event at the given time.
pub async fn insert_event<'e, E>(executor: E, key: EventKey, at: DateTime<Utc>) -> Result<TriggerEvent>
where
    E: SqliteExecutor<'e>,
{
    let timestamp_ms = at.timestamp_millis();
    let id = sqlx::query(
        r#"
        INSERT INTO trigger_events (chat_id, user_id, category_id, timestamp_ms)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(key.chat_id)
    .bind(key.user_id)
    .bind(key.category_id)
    .bind(timestamp_ms)
    .execute(executor)
    .await?
    .last_insert_rowid();

    Ok(TriggerEvent {
        id,
        chat_id: key.chat_id,
        user_id: key.user_id,
        category_id: key.category_id,
        timestamp_ms,
    })
}

/// Count events for a key at or after `since`.
pub async fn count_events_since<'e, E>(executor: E, key: EventKey, since: DateTime<Utc>) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM trigger_events
        WHERE user_id = ? AND chat_id = ? AND category_id = ? AND timestamp_ms >= ?
        "#,
    )
    .bind(key.user_id)
    .bind(key.chat_id)
    .bind(key.category_id)
    .bind(since.timestamp_millis())
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Append an event and count the window in one write transaction.
///
/// `BEGIN IMMEDIATE` takes the database write lock up front, so concurrent
/// callers observe each other's events and decisions are serialized. The
/// transaction rolls back if any step fails or the future is dropped.
pub async fn insert_and_count(
    pool: &SqlitePool,
    key: EventKey,
    at: DateTime<Utc>,
    since: DateTime<Utc>,
) -> Result<(TriggerEvent, i64)> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let event = insert_event(&mut *tx, key, at).await?;
    let count = count_events_since(&mut *tx, key, since).await?;

    tx.commit().await?;
    Ok((event, count))
}

/// Count all recorded events.
pub async fn count_events(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM trigger_events
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Delete events older than `cutoff`. Returns the number of rows removed.
pub async fn prune_older_than(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM trigger_events
        WHERE timestamp_ms < ?
        "#,
    )
    .bind(cutoff.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
