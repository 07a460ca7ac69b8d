//! Command handling module.
//!
//! Processes admin commands sent to the bot in private messages.
//! Commands use the `/trig` prefix by default; adding or editing a category
//! without inline fields starts a step-by-step wizard.

mod handler;
mod types;
mod wizard;

pub use handler::CommandHandler;
pub use types::{AddArgs, AdminCommand, CategoryFields, CommandResult, EditArgs, ScopeKind};
pub use wizard::{CategoryWizard, WizardReply, WizardStep};
