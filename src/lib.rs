//! Trigger Bot Library
//!
//! A chat bot that answers keyword-matched messages once a user has hit the
//! same rule often enough.
//!
//! This crate provides the core functionality for:
//! - Storing chats, owner-defined chat groups and keyword categories
//! - Resolving a chat's effective categories (local rules shadow group rules)
//! - Matching messages and rate-limiting responses per user, chat and category
//! - Administering categories through private-message commands
//! - Reading updates and writing replies as JSON lines

pub mod commands;
pub mod config;
pub mod gateway;
pub mod storage;
pub mod trace;
pub mod triggers;
