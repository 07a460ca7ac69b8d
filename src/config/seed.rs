//! Seed files: groups, chats and categories loaded in bulk.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{
    categories, chats, groups, parse_keywords, CategoryDraft, CategoryScope, ChatGroup, Database,
    StorageError,
};

/// Errors that can occur during seed file validation.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Group at index {index} has an empty name")]
    EmptyGroupName { index: usize },

    #[error("Duplicate group key found: {key}")]
    DuplicateGroupKey { key: String },

    #[error("Chat {chat_id} refers to unknown group '{group}'")]
    UnknownChatGroup { chat_id: i64, group: String },

    #[error("Duplicate chat id found: {chat_id}")]
    DuplicateChat { chat_id: i64 },

    #[error("Category at index {index} ({name}) has an empty name")]
    EmptyName { index: usize, name: String },

    #[error("Category at index {index} ({name}) has no keywords and would never match")]
    NoKeywords { index: usize, name: String },

    #[error("Category at index {index} ({name}) has an empty response")]
    EmptyResponse { index: usize, name: String },

    #[error("Category at index {index} ({name}) must set exactly one of chat_id or group")]
    InvalidScope { index: usize, name: String },

    #[error("Category at index {index} ({name}) refers to unknown chat {chat_id}")]
    UnknownChat {
        index: usize,
        name: String,
        chat_id: i64,
    },

    #[error("Category at index {index} ({name}) refers to unknown group '{group}'")]
    UnknownGroup {
        index: usize,
        name: String,
        group: String,
    },

    #[error("Failed to read seed file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Errors that can occur while importing a seed file.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid seed file: {0}")]
    Invalid(#[from] SeedError),

    #[error("Import failed: {0}")]
    Storage(#[from] StorageError),
}

/// A group declared in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedGroup {
    /// Name other seed entries use to refer to this group.
    pub key: String,
    pub name: String,
    pub owner_id: i64,
}

/// A chat declared in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedChat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// Key of the group to attach to.
    #[serde(default)]
    pub group: Option<String>,
}

/// A category declared in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedCategory {
    pub name: String,
    pub keywords: String,
    pub response: String,
    /// Set for a local category.
    #[serde(default)]
    pub chat_id: Option<i64>,
    /// Group key, set for a group category.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

/// Counts of rows written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub groups: usize,
    pub chats: usize,
    pub categories: usize,
}

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedFile {
    #[serde(default)]
    pub groups: Vec<SeedGroup>,
    #[serde(default)]
    pub chats: Vec<SeedChat>,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
}

impl SeedFile {
    /// Loads a seed file from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let content = std::fs::read_to_string(path)?;
        let seed: Self = serde_json::from_str(&content)?;
        Ok(seed)
    }

    /// Saves the seed file as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SeedError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the seed file.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), SeedError> {
        self.validate_all().into_iter().next().map_or(Ok(()), Err)
    }

    /// Returns every validation error in the file.
    #[must_use]
    pub fn validate_all(&self) -> Vec<SeedError> {
        let mut errors = Vec::new();

        let mut group_keys = HashSet::new();
        for (index, group) in self.groups.iter().enumerate() {
            if group.name.trim().is_empty() {
                errors.push(SeedError::EmptyGroupName { index });
            }
            if !group_keys.insert(group.key.as_str()) {
                errors.push(SeedError::DuplicateGroupKey {
                    key: group.key.clone(),
                });
            }
        }

        let mut chat_ids = HashSet::new();
        for chat in &self.chats {
            if !chat_ids.insert(chat.id) {
                errors.push(SeedError::DuplicateChat { chat_id: chat.id });
            }
            if let Some(group) = &chat.group
                && !group_keys.contains(group.as_str())
            {
                errors.push(SeedError::UnknownChatGroup {
                    chat_id: chat.id,
                    group: group.clone(),
                });
            }
        }

        for (index, category) in self.categories.iter().enumerate() {
            let name = category.name.clone();

            if category.name.trim().is_empty() {
                errors.push(SeedError::EmptyName { index, name });
                continue;
            }

            if parse_keywords(&category.keywords).is_empty() {
                errors.push(SeedError::NoKeywords { index, name });
                continue;
            }

            if category.response.trim().is_empty() {
                errors.push(SeedError::EmptyResponse { index, name });
                continue;
            }

            match (category.chat_id, &category.group) {
                (Some(chat_id), None) => {
                    if !chat_ids.contains(&chat_id) {
                        errors.push(SeedError::UnknownChat {
                            index,
                            name,
                            chat_id,
                        });
                    }
                }
                (None, Some(group)) => {
                    if !group_keys.contains(group.as_str()) {
                        errors.push(SeedError::UnknownGroup {
                            index,
                            name,
                            group: group.clone(),
                        });
                    }
                }
                _ => errors.push(SeedError::InvalidScope { index, name }),
            }
        }

        errors
    }

    /// Validates the file and writes its contents to the database.
    ///
    /// Groups and categories are always created anew; chats are registered
    /// idempotently.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or a write fails. Rows written
    /// before a failing write are kept.
    pub async fn import(&self, db: &Database) -> Result<ImportSummary, ImportError> {
        self.validate()?;

        let mut summary = ImportSummary::default();
        let mut group_ids: HashMap<&str, ChatGroup> = HashMap::new();

        for group in &self.groups {
            let created = groups::create_group(db.pool(), group.name.trim(), group.owner_id, None).await?;
            group_ids.insert(group.key.as_str(), created);
            summary.groups += 1;
        }

        for chat in &self.chats {
            chats::register_chat(db.pool(), chat.id, chat.title.as_deref()).await?;
            if let Some(group) = chat.group.as_deref().and_then(|key| group_ids.get(key)) {
                chats::attach_chat(db.pool(), chat.id, group.id, group.owner_id).await?;
            }
            summary.chats += 1;
        }

        for category in &self.categories {
            let scope = match (category.chat_id, category.group.as_deref()) {
                (Some(chat_id), None) => CategoryScope::Chat(chat_id),
                (None, Some(key)) => match group_ids.get(key) {
                    Some(group) => CategoryScope::Group(group.id),
                    None => continue,
                },
                _ => continue,
            };
            let mut draft = CategoryDraft::new(
                scope,
                category.name.as_str(),
                category.keywords.as_str(),
                category.response.as_str(),
            );
            draft.owner_id = category.owner_id;
            categories::upsert_category(db.pool(), None, &draft).await?;
            summary.categories += 1;
        }

        tracing::info!(
            groups = summary.groups,
            chats = summary.chats,
            categories = summary.categories,
            "Seed file imported"
        );
        Ok(summary)
    }

    /// Creates an example seed file for users to reference.
    #[must_use]
    pub fn example() -> Self {
        Self {
            groups: vec![SeedGroup {
                key: "community".to_owned(),
                name: "Community chats".to_owned(),
                owner_id: 123_456_789,
            }],
            chats: vec![
                SeedChat {
                    id: -1_001_234_567_890,
                    title: Some("General".to_owned()),
                    group: Some("community".to_owned()),
                },
                SeedChat {
                    id: -1_009_876_543_210,
                    title: Some("Offtopic".to_owned()),
                    group: Some("community".to_owned()),
                },
            ],
            categories: vec![
                SeedCategory {
                    name: "Politics".to_owned(),
                    keywords: "election, president, parliament".to_owned(),
                    response: "Please keep political discussions out of this community.".to_owned(),
                    chat_id: None,
                    group: Some("community".to_owned()),
                    owner_id: Some(123_456_789),
                },
                SeedCategory {
                    name: "Politics".to_owned(),
                    keywords: "election, president".to_owned(),
                    response: "Politics is fine here, but keep it civil.".to_owned(),
                    chat_id: Some(-1_009_876_543_210),
                    group: None,
                    owner_id: Some(123_456_789),
                },
            ],
        }
    }

    /// Returns the number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Checks if there are no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
