//! Command handler implementation.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::types::{AddArgs, AdminCommand, CategoryFields, CommandResult, EditArgs, ScopeKind};
use super::wizard::{CategoryWizard, WizardReply};
use crate::storage::{
    categories, chats, groups, CategoryDraft, CategoryScope, Chat, Database, StorageError,
};

type HandlerResult = Result<CommandResult, StorageError>;

/// Handles admin commands sent in private chats.
pub struct CommandHandler {
    /// Command prefix (e.g., "`/trig`").
    prefix: String,

    db: Database,

    /// Running wizards by user id.
    wizards: Mutex<HashMap<i64, CategoryWizard>>,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(prefix: impl Into<String>, db: Database) -> Self {
        Self {
            prefix: prefix.into(),
            db,
            wizards: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn has_wizard(&self, user_id: i64) -> bool {
        self.wizards.lock().await.contains_key(&user_id)
    }

    /// Tries to parse and execute a command from a private message.
    ///
    /// Text that is not a command is fed to the user's running wizard.
    /// Returns `None` if the message is neither.
    pub async fn try_handle(&self, user_id: i64, message_text: &str) -> Option<CommandResult> {
        if let Some(command) = AdminCommand::parse(message_text, &self.prefix) {
            debug!(user_id, "Handling command: {}", command);
            let result = self
                .execute(user_id, command)
                .await
                .unwrap_or_else(storage_failure);
            info!(user_id, success = result.success, "Command result");
            return Some(result);
        }

        self.continue_wizard(user_id, message_text).await
    }

    /// Executes a parsed command.
    async fn execute(&self, user_id: i64, command: AdminCommand) -> HandlerResult {
        match command {
            AdminCommand::Help => Ok(self.handle_help()),
            AdminCommand::Groups => self.handle_groups(user_id).await,
            AdminCommand::Group(group_id) => self.handle_group(user_id, group_id).await,
            AdminCommand::NewGroup { chat_id, name } => {
                self.handle_new_group(user_id, chat_id, &name).await
            }
            AdminCommand::Attach { chat_id, group_id } => {
                self.handle_attach(user_id, chat_id, group_id).await
            }
            AdminCommand::Detach(chat_id) => self.handle_detach(user_id, chat_id).await,
            AdminCommand::Cats(chat_id) => self.handle_cats(chat_id).await,
            AdminCommand::Add(args) => self.handle_add(user_id, args).await,
            AdminCommand::Edit(args) => self.handle_edit(user_id, args).await,
            AdminCommand::Delete(category_id) => self.handle_delete(user_id, category_id).await,
            AdminCommand::Cancel => Ok(self.handle_cancel(user_id).await),
        }
    }

    fn handle_help(&self) -> CommandResult {
        let mut lines = vec![
            format!("Trigger Bot Commands (prefix: {})", self.prefix),
            String::new(),
        ];

        for (cmd, desc) in AdminCommand::all_commands() {
            lines.push(format!("  {cmd} - {desc}"));
        }

        lines.push(String::new());
        lines.push("[fields] is \"name | keywords | response\"; omit it to be asked step by step.".to_owned());

        CommandResult::success(lines.join("\n"))
    }

    async fn handle_groups(&self, user_id: i64) -> HandlerResult {
        let owned = groups::list_groups_for_owner(self.db.pool(), user_id).await?;

        if owned.is_empty() {
            return Ok(CommandResult::success(
                "You have no groups. Use 'newgroup <chat> <name>' to create one.",
            ));
        }

        let mut lines = vec!["Your groups:".to_owned()];
        for group in owned {
            let members = chats::list_group_chats(self.db.pool(), group.id).await?;
            lines.push(format!("  [{}] {} ({} chats)", group.id, group.name, members.len()));
        }

        Ok(CommandResult::success(lines.join("\n")))
    }

    async fn handle_group(&self, user_id: i64, group_id: i64) -> HandlerResult {
        let group = groups::get_owned_group(self.db.pool(), group_id, user_id).await?;
        let members = chats::list_group_chats(self.db.pool(), group_id).await?;
        let shared = categories::list_group_categories(self.db.pool(), group_id).await?;

        let mut lines = vec![format!("Group [{}] {}", group.id, group.name), "Chats:".to_owned()];
        if members.is_empty() {
            lines.push("  (none)".to_owned());
        }
        for chat in &members {
            lines.push(format!("  {}", chat_label(chat)));
        }

        lines.push("Group categories:".to_owned());
        if shared.is_empty() {
            lines.push("  (none)".to_owned());
        }
        for category in &shared {
            lines.push(format!(
                "  [{}] {}: {}",
                category.id,
                category.name,
                truncate(&category.keywords, 40)
            ));
        }

        Ok(CommandResult::success(lines.join("\n")))
    }

    async fn handle_new_group(&self, user_id: i64, chat_id: i64, name: &str) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), chat_id).await?;
        self.ensure_chat_movable(&chat, user_id).await?;

        let group = groups::create_group(self.db.pool(), name, user_id, Some(chat_id)).await?;

        Ok(CommandResult::success(format!(
            "✓ Group [{}] '{}' created with chat {chat_id}",
            group.id, group.name
        )))
    }

    async fn handle_attach(&self, user_id: i64, chat_id: i64, group_id: i64) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), chat_id).await?;

        if chat.group_id == Some(group_id) {
            return Ok(CommandResult::error(format!(
                "Chat {chat_id} is already in group {group_id}."
            )));
        }
        self.ensure_chat_movable(&chat, user_id).await?;

        let group = chats::attach_chat(self.db.pool(), chat_id, group_id, user_id).await?;

        Ok(CommandResult::success(format!(
            "✓ Chat {chat_id} attached to group '{}'",
            group.name
        )))
    }

    async fn handle_detach(&self, user_id: i64, chat_id: i64) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), chat_id).await?;

        let Some(group_id) = chat.group_id else {
            return Ok(CommandResult::error(format!("Chat {chat_id} is not in a group.")));
        };
        let group = groups::get_owned_group(self.db.pool(), group_id, user_id).await?;

        chats::detach_chat(self.db.pool(), chat_id).await?;

        Ok(CommandResult::success(format!(
            "✓ Chat {chat_id} detached from group '{}'",
            group.name
        )))
    }

    async fn handle_cats(&self, chat_id: i64) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), chat_id).await?;
        let listing = categories::list_categories_for_admin(self.db.pool(), chat_id).await?;

        let mut lines = vec![format!("Categories of {}", chat_label(&chat)), "Local:".to_owned()];
        if listing.local.is_empty() {
            lines.push("  (none)".to_owned());
        }
        for category in &listing.local {
            lines.push(format!(
                "  [{}] {}: {}",
                category.id,
                category.name,
                truncate(&category.keywords, 40)
            ));
        }

        if let Some(group_id) = chat.group_id {
            let group = groups::get_group(self.db.pool(), group_id).await?;
            lines.push(format!("Group '{}':", group.name));
            if listing.group.is_empty() {
                lines.push("  (none)".to_owned());
            }
            for entry in &listing.group {
                let marker = if entry.shadowed { " (overridden)" } else { "" };
                lines.push(format!(
                    "  [{}] {}{marker}: {}",
                    entry.category.id,
                    entry.category.name,
                    truncate(&entry.category.keywords, 40)
                ));
            }
        }

        Ok(CommandResult::success(lines.join("\n")))
    }

    async fn handle_add(&self, user_id: i64, args: AddArgs) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), args.chat_id).await?;

        let scope = match args.scope {
            ScopeKind::Local => CategoryScope::Chat(chat.id),
            ScopeKind::Group => {
                let Some(group_id) = chat.group_id else {
                    return Ok(CommandResult::error(format!(
                        "Chat {} is not in a group. Use 'newgroup' or 'attach' first.",
                        chat.id
                    )));
                };
                groups::get_owned_group(self.db.pool(), group_id, user_id).await?;
                CategoryScope::Group(group_id)
            }
        };

        match args.fields {
            Some(fields) => self.save_category(user_id, None, scope, &fields).await,
            None => Ok(self.start_wizard(user_id, CategoryWizard::add(scope, chat.id)).await),
        }
    }

    async fn handle_edit(&self, user_id: i64, args: EditArgs) -> HandlerResult {
        let chat = chats::get_chat(self.db.pool(), args.chat_id).await?;
        let category = categories::get_category(self.db.pool(), args.category_id).await?;

        let scope = category.scope()?;
        let visible = match scope {
            CategoryScope::Chat(chat_id) => chat_id == chat.id,
            CategoryScope::Group(group_id) => chat.group_id == Some(group_id),
        };
        if !visible {
            return Ok(CommandResult::error(format!(
                "Category {} does not belong to chat {}.",
                category.id, chat.id
            )));
        }
        if let CategoryScope::Group(group_id) = scope {
            groups::get_owned_group(self.db.pool(), group_id, user_id).await?;
        }

        match args.fields {
            Some(fields) => self.save_category(user_id, Some(category.id), scope, &fields).await,
            None => {
                let wizard = CategoryWizard::edit(&category, scope, chat.id);
                Ok(self.start_wizard(user_id, wizard).await)
            }
        }
    }

    async fn handle_delete(&self, user_id: i64, category_id: i64) -> HandlerResult {
        let category = categories::get_category(self.db.pool(), category_id).await?;

        if let Some(group_id) = category.group_id {
            groups::get_owned_group(self.db.pool(), group_id, user_id).await?;
        }

        categories::delete_category(self.db.pool(), category_id).await?;

        Ok(CommandResult::success(format!(
            "✓ Deleted category [{}] '{}'",
            category.id, category.name
        )))
    }

    async fn handle_cancel(&self, user_id: i64) -> CommandResult {
        if self.wizards.lock().await.remove(&user_id).is_some() {
            CommandResult::success("✓ Cancelled.")
        } else {
            CommandResult::error("Nothing to cancel.")
        }
    }

    async fn start_wizard(&self, user_id: i64, wizard: CategoryWizard) -> CommandResult {
        let prompt = wizard.prompt();
        let replaced = self.wizards.lock().await.insert(user_id, wizard).is_some();
        if replaced {
            debug!(user_id, "Previous wizard discarded");
        }
        CommandResult::success(prompt)
    }

    async fn continue_wizard(&self, user_id: i64, text: &str) -> Option<CommandResult> {
        let (wizard, fields) = {
            let mut wizards = self.wizards.lock().await;
            let wizard = wizards.get_mut(&user_id)?;
            match wizard.answer(text) {
                WizardReply::Prompt(prompt) => return Some(CommandResult::success(prompt)),
                WizardReply::Invalid(message) => return Some(CommandResult::error(message)),
                WizardReply::Complete(fields) => (wizards.remove(&user_id)?, fields),
            }
        };

        let result = self
            .save_category(user_id, wizard.category_id, wizard.scope, &fields)
            .await
            .unwrap_or_else(storage_failure);
        Some(result)
    }

    async fn save_category(
        &self,
        user_id: i64,
        category_id: Option<i64>,
        scope: CategoryScope,
        fields: &CategoryFields,
    ) -> HandlerResult {
        let draft = CategoryDraft::new(
            scope,
            fields.name.as_str(),
            fields.keywords.as_str(),
            fields.response.as_str(),
        )
        .with_owner(user_id);

        let saved = categories::upsert_category(self.db.pool(), category_id, &draft).await?;

        let verb = if category_id.is_some() { "updated" } else { "saved" };
        let mut message = format!("✓ Category [{}] '{}' {verb}", saved.id, saved.name);
        if saved.keyword_tokens().is_empty() {
            message.push_str("\nWarning: it has no keywords and will never match.");
        }
        Ok(CommandResult::success(message))
    }

    /// A chat may leave its current group only with that group owner's consent.
    async fn ensure_chat_movable(&self, chat: &Chat, user_id: i64) -> Result<(), StorageError> {
        if let Some(group_id) = chat.group_id {
            groups::get_owned_group(self.db.pool(), group_id, user_id).await?;
        }
        Ok(())
    }
}

fn storage_failure(err: StorageError) -> CommandResult {
    match err {
        StorageError::ChatNotFound(chat_id) => CommandResult::error(format!(
            "✗ Chat {chat_id} is not registered. Make the bot an administrator there first."
        )),
        StorageError::NotOwner { .. } => {
            CommandResult::error("✗ Only the group owner can do that.")
        }
        StorageError::NotFound { entity, id } => {
            CommandResult::error(format!("✗ {entity} {id} not found."))
        }
        StorageError::InvalidScope { .. } => {
            CommandResult::error("✗ A category must belong to exactly one chat or group.")
        }
        other => {
            error!(error = %other, "Admin command failed");
            CommandResult::error("✗ Storage error, please try again later.")
        }
    }
}

fn chat_label(chat: &Chat) -> String {
    match &chat.title {
        Some(title) => format!("{} ({title})", chat.id),
        None => chat.id.to_string(),
    }
}

/// Truncates a string to a maximum length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
