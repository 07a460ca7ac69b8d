//! SQLite persistence for chats, groups, categories and trigger events.
//!
//! Operations are free functions over a `SqlitePool`; each one acquires a
//! pooled connection for the duration of the call and releases it on every
//! exit path. The [`TriggerStore`] trait is the narrower view the trigger
//! engine works against.

pub mod categories;
pub mod chats;
mod error;
pub mod events;
pub mod groups;
mod models;
mod store;

pub use categories::{CategoryListing, EffectiveCategories, GroupCategoryEntry};
pub use error::{Result, StorageError};
pub use models::{
    normalize_keywords, parse_keywords, Category, CategoryDraft, CategoryScope, Chat, ChatGroup,
    EventKey, TriggerEvent,
};
pub use store::TriggerStore;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size; message tasks each hold a connection only per call.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`;
    /// `sqlite::memory:` gives a database shared by the pool's connections.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::debug!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_database() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    async fn count_categories(db: &Database) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_scope_without_writing() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, None).await.unwrap();
        let group = groups::create_group(db.pool(), "Team", 1, None).await.unwrap();

        let mut both = CategoryDraft::new(CategoryScope::Chat(-100), "A", "a", "r");
        both.group_id = Some(group.id);
        let result = categories::upsert_category(db.pool(), None, &both).await;
        assert!(matches!(result, Err(StorageError::InvalidScope { .. })));

        let mut neither = both.clone();
        neither.chat_id = None;
        neither.group_id = None;
        let result = categories::upsert_category(db.pool(), None, &neither).await;
        assert!(matches!(result, Err(StorageError::InvalidScope { .. })));

        assert_eq!(count_categories(&db).await, 0);
    }

    #[tokio::test]
    async fn test_local_category_requires_registered_chat() {
        let db = test_database().await;
        let draft = CategoryDraft::new(CategoryScope::Chat(-5), "A", "a", "r");
        let result = categories::upsert_category(db.pool(), None, &draft).await;
        assert!(matches!(result, Err(StorageError::ChatNotFound(-5))));
    }

    #[tokio::test]
    async fn test_category_crud() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, Some("Main")).await.unwrap();

        // Create
        let draft = CategoryDraft::new(CategoryScope::Chat(-100), " Politics ", "Election, President", "R1")
            .with_owner(7);
        let created = categories::upsert_category(db.pool(), None, &draft).await.unwrap();
        assert_eq!(created.name, "Politics");
        assert_eq!(created.keywords, "election,president");

        // Read
        let fetched = categories::get_category(db.pool(), created.id).await.unwrap();
        assert_eq!(fetched, created);

        // Update
        let edited = CategoryDraft::new(CategoryScope::Chat(-100), "Politics", "vote", "R2");
        let updated = categories::upsert_category(db.pool(), Some(created.id), &edited)
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        let fetched = categories::get_category(db.pool(), created.id).await.unwrap();
        assert_eq!(fetched.response, "R2");
        assert_eq!(fetched.keywords, "vote");

        // Delete
        categories::delete_category(db.pool(), created.id).await.unwrap();
        let result = categories::get_category(db.pool(), created.id).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        let result = categories::delete_category(db.pool(), created.id).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_missing_category() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, None).await.unwrap();
        let draft = CategoryDraft::new(CategoryScope::Chat(-100), "A", "a", "r");
        let result = categories::upsert_category(db.pool(), Some(999), &draft).await;
        assert!(matches!(result, Err(StorageError::NotFound { id: 999, .. })));
    }

    #[tokio::test]
    async fn test_resolution_merges_and_is_idempotent() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, None).await.unwrap();
        let group = groups::create_group(db.pool(), "Team", 1, Some(-100)).await.unwrap();

        let group_politics = CategoryDraft::new(CategoryScope::Group(group.id), "Politics", "vote", "G");
        categories::upsert_category(db.pool(), None, &group_politics).await.unwrap();
        let group_spam = CategoryDraft::new(CategoryScope::Group(group.id), "Spam", "buy", "S");
        categories::upsert_category(db.pool(), None, &group_spam).await.unwrap();
        let local_politics = CategoryDraft::new(CategoryScope::Chat(-100), "Politics", "election", "L");
        let local = categories::upsert_category(db.pool(), None, &local_politics).await.unwrap();

        let first = db.resolve_effective_categories(-100).await.unwrap();
        let second = db.resolve_effective_categories(-100).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.get("Politics").unwrap().id, local.id);
        assert_eq!(first.get("Spam").unwrap().response, "S");

        let listing = categories::list_categories_for_admin(db.pool(), -100).await.unwrap();
        assert_eq!(listing.local.len(), 1);
        assert_eq!(listing.group.len(), 2);
        assert!(listing.group.iter().any(|e| e.shadowed && e.category.name == "Politics"));
    }

    #[tokio::test]
    async fn test_resolve_unregistered_chat() {
        let db = test_database().await;
        let result = db.resolve_effective_categories(-404).await;
        assert!(matches!(result, Err(StorageError::ChatNotFound(-404))));
    }

    #[tokio::test]
    async fn test_create_group_requires_chat() {
        let db = test_database().await;
        let result = groups::create_group(db.pool(), "Team", 1, Some(-1)).await;
        assert!(matches!(result, Err(StorageError::ChatNotFound(-1))));
        assert!(groups::list_groups_for_owner(db.pool(), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_requires_owner() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, None).await.unwrap();
        chats::register_chat(db.pool(), -200, None).await.unwrap();
        let group = groups::create_group(db.pool(), "Team", 1, Some(-100)).await.unwrap();

        let result = chats::attach_chat(db.pool(), -200, group.id, 2).await;
        assert!(matches!(result, Err(StorageError::NotOwner { .. })));

        chats::attach_chat(db.pool(), -200, group.id, 1).await.unwrap();
        let members = chats::list_group_chats(db.pool(), group.id).await.unwrap();
        assert_eq!(members.len(), 2);

        chats::detach_chat(db.pool(), -200).await.unwrap();
        let chat = chats::get_chat(db.pool(), -200).await.unwrap();
        assert_eq!(chat.group_id, None);
    }

    #[tokio::test]
    async fn test_register_chat_is_idempotent() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, Some("Old")).await.unwrap();
        let group = groups::create_group(db.pool(), "Team", 1, Some(-100)).await.unwrap();

        let chat = chats::register_chat(db.pool(), -100, None).await.unwrap();
        assert_eq!(chat.group_id, Some(group.id));
        assert_eq!(chat.title.as_deref(), Some("Old"));
    }

    #[tokio::test]
    async fn test_remove_chat_drops_local_categories() {
        let db = test_database().await;
        chats::register_chat(db.pool(), -100, None).await.unwrap();
        let draft = CategoryDraft::new(CategoryScope::Chat(-100), "A", "a", "r");
        categories::upsert_category(db.pool(), None, &draft).await.unwrap();

        assert!(chats::remove_chat(db.pool(), -100).await.unwrap());
        assert!(!chats::remove_chat(db.pool(), -100).await.unwrap());
        assert_eq!(count_categories(&db).await, 0);
    }

    #[tokio::test]
    async fn test_event_window_count() {
        let db = test_database().await;
        let key = EventKey {
            user_id: 1,
            chat_id: -100,
            category_id: 3,
        };
        let other = EventKey { user_id: 2, ..key };
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        events::insert_event(db.pool(), key, base).await.unwrap();
        events::insert_event(db.pool(), key, base + chrono::Duration::minutes(5)).await.unwrap();
        events::insert_event(db.pool(), other, base + chrono::Duration::minutes(5)).await.unwrap();

        let since = base + chrono::Duration::minutes(1);
        assert_eq!(events::count_events_since(db.pool(), key, since).await.unwrap(), 1);
        assert_eq!(events::count_events_since(db.pool(), key, base).await.unwrap(), 2);

        let (event, count) = events::insert_and_count(
            db.pool(),
            key,
            base + chrono::Duration::minutes(6),
            base,
        )
        .await
        .unwrap();
        assert_eq!((event.user_id, event.chat_id, event.category_id), (1, -100, 3));
        assert_eq!(count, 3);

        let pruned = events::prune_older_than(db.pool(), since).await.unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(events::count_events(db.pool()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insert_and_count_rolls_back_on_failure() {
        let db = test_database().await;
        let key = EventKey {
            user_id: 1,
            chat_id: -100,
            category_id: 3,
        };
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        events::insert_event(db.pool(), key, base).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_events BEFORE INSERT ON trigger_events
            BEGIN
                SELECT RAISE(ABORT, 'rejected');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let at = base + chrono::Duration::minutes(1);
        assert!(events::insert_and_count(db.pool(), key, at, base).await.is_err());

        sqlx::query("DROP TRIGGER reject_events")
            .execute(db.pool())
            .await
            .unwrap();

        let (_, count) = events::insert_and_count(db.pool(), key, at, base).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(events::count_events(db.pool()).await.unwrap(), 2);
    }
}
