//! Command types and definitions.

use std::fmt;

/// Which scope a new category is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Only the given chat.
    Local,
    /// Every chat of the given chat's group.
    Group,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Name, keywords and response of a category as typed by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub keywords: String,
    pub response: String,
}

impl CategoryFields {
    /// Parses inline fields: `<name> | <keywords> | <response>`.
    ///
    /// The response may itself contain `|`.
    #[must_use]
    pub fn parse(args: &str) -> Option<Self> {
        let mut parts = args.splitn(3, '|').map(str::trim);
        let name = parts.next()?;
        let keywords = parts.next()?;
        let response = parts.next()?;

        if name.is_empty() || response.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_owned(),
            keywords: keywords.to_owned(),
            response: response.to_owned(),
        })
    }
}

/// Arguments for adding a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub scope: ScopeKind,
    pub chat_id: i64,
    /// Inline fields; the wizard asks for them when absent.
    pub fields: Option<CategoryFields>,
}

/// Arguments for editing a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    pub category_id: i64,
    /// Chat the admin is editing from.
    pub chat_id: i64,
    pub fields: Option<CategoryFields>,
}

/// Available admin commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Show help information.
    Help,

    /// List the groups owned by the sender.
    Groups,

    /// Show a group with its chats and categories.
    Group(i64),

    /// Create a group and attach a first chat to it.
    NewGroup { chat_id: i64, name: String },

    /// Attach a chat to a group.
    Attach { chat_id: i64, group_id: i64 },

    /// Detach a chat from its group.
    Detach(i64),

    /// List the categories visible in a chat.
    Cats(i64),

    /// Add a category.
    Add(AddArgs),

    /// Edit a category.
    Edit(EditArgs),

    /// Delete a category.
    Delete(i64),

    /// Abort the running wizard.
    Cancel,
}

impl AdminCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not a valid command.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let text = text.trim();
        let after_prefix = text.strip_prefix(prefix)?;

        // "/trigger" must not parse as "/trig ger"
        if !after_prefix.is_empty() && !after_prefix.starts_with(char::is_whitespace) {
            return None;
        }

        let after_prefix = after_prefix.trim_start();
        let (cmd, args) = match after_prefix.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
            None => (after_prefix.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "" | "help" | "h" | "?" => Some(Self::Help),
            "groups" => Some(Self::Groups),
            "group" => parse_id(args).map(Self::Group),
            "newgroup" => Self::parse_new_group(args),
            "attach" => Self::parse_attach(args),
            "detach" => parse_id(args).map(Self::Detach),
            "cats" | "categories" | "ls" => parse_id(args).map(Self::Cats),
            "add" | "new" => Self::parse_add(args),
            "edit" => Self::parse_edit(args),
            "delete" | "del" | "rm" => parse_id(args).map(Self::Delete),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Parses `<chat_id> <name>`.
    fn parse_new_group(args: &str) -> Option<Self> {
        let (chat_id, name) = args.split_once(char::is_whitespace)?;
        let chat_id = chat_id.parse().ok()?;
        let name = name.trim();

        if name.is_empty() {
            return None;
        }

        Some(Self::NewGroup {
            chat_id,
            name: name.to_owned(),
        })
    }

    /// Parses `<chat_id> <group_id>`.
    fn parse_attach(args: &str) -> Option<Self> {
        let mut parts = args.split_whitespace();
        let chat_id = parts.next()?.parse().ok()?;
        let group_id = parts.next()?.parse().ok()?;

        if parts.next().is_some() {
            return None;
        }

        Some(Self::Attach { chat_id, group_id })
    }

    /// Parses `local|group <chat_id> [<name> | <keywords> | <response>]`.
    fn parse_add(args: &str) -> Option<Self> {
        let mut parts = args.splitn(3, char::is_whitespace);
        let scope = match parts.next()?.to_lowercase().as_str() {
            "local" => ScopeKind::Local,
            "group" => ScopeKind::Group,
            _ => return None,
        };
        let chat_id = parts.next()?.parse().ok()?;
        let fields = parse_optional_fields(parts.next())?;

        Some(Self::Add(AddArgs {
            scope,
            chat_id,
            fields,
        }))
    }

    /// Parses `<category_id> <chat_id> [<name> | <keywords> | <response>]`.
    fn parse_edit(args: &str) -> Option<Self> {
        let mut parts = args.splitn(3, char::is_whitespace);
        let category_id = parts.next()?.parse().ok()?;
        let chat_id = parts.next()?.parse().ok()?;
        let fields = parse_optional_fields(parts.next())?;

        Some(Self::Edit(EditArgs {
            category_id,
            chat_id,
            fields,
        }))
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Groups => "groups",
            Self::Group(_) => "group",
            Self::NewGroup { .. } => "newgroup",
            Self::Attach { .. } => "attach",
            Self::Detach(_) => "detach",
            Self::Cats(_) => "cats",
            Self::Add(_) => "add",
            Self::Edit(_) => "edit",
            Self::Delete(_) => "delete",
            Self::Cancel => "cancel",
        }
    }

    /// Returns all available commands with their descriptions.
    #[must_use]
    pub fn all_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("groups", "List your groups"),
            ("group <group>", "Show a group with its chats"),
            ("newgroup <chat> <name>", "Create a group containing a chat"),
            ("attach <chat> <group>", "Attach a chat to one of your groups"),
            ("detach <chat>", "Detach a chat from its group"),
            ("cats <chat>", "List the categories of a chat"),
            ("add local <chat> [fields]", "Add a category for one chat"),
            ("add group <chat> [fields]", "Add a category for the chat's group"),
            ("edit <cat> <chat> [fields]", "Edit a category"),
            ("delete <cat>", "Delete a category"),
            ("cancel", "Abort the running wizard"),
            ("help", "Show this help message"),
        ]
    }
}

/// Missing fields mean "use the wizard"; malformed fields fail the parse.
fn parse_optional_fields(rest: Option<&str>) -> Option<Option<CategoryFields>> {
    match rest.map(str::trim).filter(|r| !r.is_empty()) {
        None => Some(None),
        Some(rest) => CategoryFields::parse(rest).map(Some),
    }
}

fn parse_id(args: &str) -> Option<i64> {
    let mut parts = args.split_whitespace();
    let id = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some(id)
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "group {id}"),
            Self::NewGroup { chat_id, name } => write!(f, "newgroup {chat_id} {name}"),
            Self::Attach { chat_id, group_id } => write!(f, "attach {chat_id} {group_id}"),
            Self::Detach(chat_id) => write!(f, "detach {chat_id}"),
            Self::Cats(chat_id) => write!(f, "cats {chat_id}"),
            Self::Add(args) => write!(f, "add {} {}", args.scope, args.chat_id),
            Self::Edit(args) => write!(f, "edit {} {}", args.category_id, args.chat_id),
            Self::Delete(id) => write!(f, "delete {id}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/trig";

    #[test]
    fn test_parse_help() {
        assert_eq!(AdminCommand::parse("/trig", PREFIX), Some(AdminCommand::Help));
        assert_eq!(AdminCommand::parse("/trig help", PREFIX), Some(AdminCommand::Help));
        assert_eq!(AdminCommand::parse("/trig ?", PREFIX), Some(AdminCommand::Help));
    }

    #[test]
    fn test_parse_requires_prefix_boundary() {
        assert_eq!(AdminCommand::parse("/trigger help", PREFIX), None);
        assert_eq!(AdminCommand::parse("help", PREFIX), None);
    }

    #[test]
    fn test_parse_groups() {
        assert_eq!(AdminCommand::parse("/trig groups", PREFIX), Some(AdminCommand::Groups));
        assert_eq!(AdminCommand::parse("/trig group 4", PREFIX), Some(AdminCommand::Group(4)));
        assert_eq!(AdminCommand::parse("/trig group", PREFIX), None);
        assert_eq!(AdminCommand::parse("/trig group 4 5", PREFIX), None);
    }

    #[test]
    fn test_parse_new_group() {
        assert_eq!(
            AdminCommand::parse("/trig newgroup -100 My chats", PREFIX),
            Some(AdminCommand::NewGroup {
                chat_id: -100,
                name: "My chats".to_owned()
            })
        );
        assert_eq!(AdminCommand::parse("/trig newgroup -100", PREFIX), None);
        assert_eq!(AdminCommand::parse("/trig newgroup x name", PREFIX), None);
    }

    #[test]
    fn test_parse_attach_detach() {
        assert_eq!(
            AdminCommand::parse("/trig attach -100 3", PREFIX),
            Some(AdminCommand::Attach {
                chat_id: -100,
                group_id: 3
            })
        );
        assert_eq!(AdminCommand::parse("/trig attach -100", PREFIX), None);
        assert_eq!(AdminCommand::parse("/trig detach -100", PREFIX), Some(AdminCommand::Detach(-100)));
    }

    #[test]
    fn test_parse_add_wizard() {
        assert_eq!(
            AdminCommand::parse("/trig add local -100", PREFIX),
            Some(AdminCommand::Add(AddArgs {
                scope: ScopeKind::Local,
                chat_id: -100,
                fields: None
            }))
        );
        assert_eq!(
            AdminCommand::parse("/trig ADD Group -100", PREFIX),
            Some(AdminCommand::Add(AddArgs {
                scope: ScopeKind::Group,
                chat_id: -100,
                fields: None
            }))
        );
        assert_eq!(AdminCommand::parse("/trig add global -100", PREFIX), None);
    }

    #[test]
    fn test_parse_add_inline() {
        let command =
            AdminCommand::parse("/trig add local -100 Politics | election, president | Not here | please", PREFIX);
        assert_eq!(
            command,
            Some(AdminCommand::Add(AddArgs {
                scope: ScopeKind::Local,
                chat_id: -100,
                fields: Some(CategoryFields {
                    name: "Politics".to_owned(),
                    keywords: "election, president".to_owned(),
                    response: "Not here | please".to_owned(),
                }),
            }))
        );
    }

    #[test]
    fn test_parse_add_malformed_fields() {
        assert_eq!(AdminCommand::parse("/trig add local -100 Politics", PREFIX), None);
        assert_eq!(AdminCommand::parse("/trig add local -100 | kw | reply", PREFIX), None);
        assert_eq!(AdminCommand::parse("/trig add local -100 Name | kw |  ", PREFIX), None);
    }

    #[test]
    fn test_parse_edit() {
        assert_eq!(
            AdminCommand::parse("/trig edit 7 -100", PREFIX),
            Some(AdminCommand::Edit(EditArgs {
                category_id: 7,
                chat_id: -100,
                fields: None
            }))
        );
        assert!(matches!(
            AdminCommand::parse("/trig edit 7 -100 A | b | c", PREFIX),
            Some(AdminCommand::Edit(EditArgs { fields: Some(_), .. }))
        ));
        assert_eq!(AdminCommand::parse("/trig edit 7", PREFIX), None);
    }

    #[test]
    fn test_parse_delete_and_cancel() {
        assert_eq!(AdminCommand::parse("/trig rm 7", PREFIX), Some(AdminCommand::Delete(7)));
        assert_eq!(AdminCommand::parse("/trig cancel", PREFIX), Some(AdminCommand::Cancel));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(AdminCommand::parse("/trig frobnicate", PREFIX), None);
    }

    #[test]
    fn test_display() {
        let command = AdminCommand::parse("/trig add group -100", PREFIX).unwrap();
        assert_eq!(command.to_string(), "add group -100");
        assert_eq!(AdminCommand::Cancel.to_string(), "cancel");
    }
}
