//! Category persistence and local/group resolution.

use std::collections::{BTreeMap, HashSet};

use sqlx::SqlitePool;

use super::error::{Result, StorageError};
use super::models::{normalize_keywords, Category, CategoryDraft, CategoryScope};

/// Insert a category (`id == None`) or overwrite an existing one.
///
/// The draft's scope is validated before anything touches the database; a
/// draft naming both or neither of chat and group fails with `InvalidScope`.
/// Keywords are stored in normalized form.
pub async fn upsert_category(
    pool: &SqlitePool,
    id: Option<i64>,
    draft: &CategoryDraft,
) -> Result<Category> {
    let scope = draft.scope()?;

    match scope {
        CategoryScope::Chat(chat_id) => {
            super::chats::get_chat(pool, chat_id).await?;
        }
        CategoryScope::Group(group_id) => {
            super::groups::get_group(pool, group_id).await?;
        }
    }

    let keywords = normalize_keywords(&draft.keywords);
    let name = draft.name.trim();

    let id = match id {
        Some(id) => {
            let result = sqlx::query(
                r#"
                UPDATE categories
                SET name = ?, keywords = ?, response = ?, chat_id = ?, group_id = ?, owner_id = ?
                WHERE id = ?
                "#,
            )
            .bind(name)
            .bind(&keywords)
            .bind(&draft.response)
            .bind(scope.chat_id())
            .bind(scope.group_id())
            .bind(draft.owner_id)
            .bind(id)
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StorageError::NotFound {
                    entity: "Category",
                    id,
                });
            }
            id
        }
        None => sqlx::query(
            r#"
            INSERT INTO categories (name, keywords, response, chat_id, group_id, owner_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(&keywords)
        .bind(&draft.response)
        .bind(scope.chat_id())
        .bind(scope.group_id())
        .bind(draft.owner_id)
        .execute(pool)
        .await?
        .last_insert_rowid(),
    };

    tracing::debug!(category_id = id, name, ?scope, "Category saved");

    Ok(Category {
        id,
        name: name.to_owned(),
        keywords,
        response: draft.response.clone(),
        chat_id: scope.chat_id(),
        group_id: scope.group_id(),
        owner_id: draft.owner_id,
    })
}

/// Get a category by ID.
pub async fn get_category(pool: &SqlitePool, id: i64) -> Result<Category> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, keywords, response, chat_id, group_id, owner_id
        FROM categories
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StorageError::NotFound {
        entity: "Category",
        id,
    })
}

/// Delete a category by ID.
pub async fn delete_category(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM categories
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound {
            entity: "Category",
            id,
        });
    }

    Ok(())
}

/// List the local categories of a chat, ordered by ID.
pub async fn list_chat_categories(pool: &SqlitePool, chat_id: i64) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, keywords, response, chat_id, group_id, owner_id
        FROM categories
        WHERE chat_id = ?
        ORDER BY id
        "#,
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// List the categories of a group, ordered by ID.
pub async fn list_group_categories(pool: &SqlitePool, group_id: i64) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name, keywords, response, chat_id, group_id, owner_id
        FROM categories
        WHERE group_id = ?
        ORDER BY id
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// The categories that apply to one chat, keyed by name.
///
/// Local categories shadow group categories with the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveCategories {
    by_name: BTreeMap<String, Category>,
}

impl EffectiveCategories {
    /// Merges group and local categories.
    ///
    /// Inputs are expected in ascending ID order; within one scope a later
    /// category replaces an earlier one of the same name.
    #[must_use]
    pub fn merge(local: Vec<Category>, group: Vec<Category>) -> Self {
        let mut by_name = BTreeMap::new();
        for category in group.into_iter().chain(local) {
            by_name.insert(category.name.clone(), category);
        }
        Self { by_name }
    }

    /// Returns the category with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.by_name.get(name)
    }

    /// Iterates categories in name order (stable display order).
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.by_name.values()
    }

    /// Returns categories in the order keyword matching visits them.
    #[must_use]
    pub fn in_match_order(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.by_name.values().collect();
        categories.sort_by_key(|c| c.id);
        categories
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// A group category as shown in a chat's admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCategoryEntry {
    pub category: Category,
    /// A local category with the same name overrides this one.
    pub shadowed: bool,
}

/// Every category an admin of a chat can see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryListing {
    pub local: Vec<Category>,
    pub group: Vec<GroupCategoryEntry>,
}

impl CategoryListing {
    /// Builds a listing, flagging shadowed group categories.
    #[must_use]
    pub fn new(local: Vec<Category>, group: Vec<Category>) -> Self {
        let local_names: HashSet<&str> = local.iter().map(|c| c.name.as_str()).collect();
        let group = group
            .into_iter()
            .map(|category| GroupCategoryEntry {
                shadowed: local_names.contains(category.name.as_str()),
                category,
            })
            .collect();
        Self { local, group }
    }
}

/// List a chat's local categories together with its group's categories.
pub async fn list_categories_for_admin(pool: &SqlitePool, chat_id: i64) -> Result<CategoryListing> {
    let chat = super::chats::get_chat(pool, chat_id).await?;
    let local = list_chat_categories(pool, chat_id).await?;
    let group = match chat.group_id {
        Some(group_id) => list_group_categories(pool, group_id).await?,
        None => Vec::new(),
    };
    Ok(CategoryListing::new(local, group))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, scope: CategoryScope) -> Category {
        Category {
            id,
            name: name.to_owned(),
            keywords: "kw".to_owned(),
            response: format!("response {id}"),
            chat_id: scope.chat_id(),
            group_id: scope.group_id(),
            owner_id: None,
        }
    }

    #[test]
    fn test_merge_local_overrides_group() {
        let local = vec![category(5, "Politics", CategoryScope::Chat(-1))];
        let group = vec![
            category(1, "Politics", CategoryScope::Group(9)),
            category(2, "Spam", CategoryScope::Group(9)),
        ];

        let merged = EffectiveCategories::merge(local, group);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("Politics").unwrap().id, 5);
        assert_eq!(merged.get("Spam").unwrap().id, 2);
    }

    #[test]
    fn test_merge_same_scope_duplicate_keeps_latest() {
        let local = vec![
            category(3, "Dup", CategoryScope::Chat(-1)),
            category(8, "Dup", CategoryScope::Chat(-1)),
        ];
        let merged = EffectiveCategories::merge(local, Vec::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("Dup").unwrap().id, 8);
    }

    #[test]
    fn test_match_order_is_by_id() {
        let local = vec![category(7, "Alpha", CategoryScope::Chat(-1))];
        let group = vec![category(2, "Zulu", CategoryScope::Group(1))];
        let merged = EffectiveCategories::merge(local, group);

        let ids: Vec<i64> = merged.in_match_order().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 7]);

        let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zulu"]);
    }

    #[test]
    fn test_listing_flags_shadowed() {
        let local = vec![category(5, "Politics", CategoryScope::Chat(-1))];
        let group = vec![
            category(1, "Politics", CategoryScope::Group(9)),
            category(2, "Spam", CategoryScope::Group(9)),
        ];

        let listing = CategoryListing::new(local, group);

        assert_eq!(listing.local.len(), 1);
        assert!(listing.group[0].shadowed);
        assert!(!listing.group[1].shadowed);
    }
}
