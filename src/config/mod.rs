//! Configuration module for the trigger bot.
//!
//! Handles runtime settings read from the environment and seed files used to
//! load chats, groups and categories in bulk.

mod seed;
mod settings;

pub use seed::{ImportError, ImportSummary, SeedCategory, SeedChat, SeedError, SeedFile, SeedGroup};
pub use settings::{BotSettings, ConfigError};
