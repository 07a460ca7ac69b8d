//! Three-step category wizard: name, keywords, response.

use super::types::CategoryFields;
use crate::storage::{Category, CategoryScope};

/// The field the wizard asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Name,
    Keywords,
    Response,
}

/// What a wizard answer led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardReply {
    /// Ask the user for the next field.
    Prompt(String),
    /// The answer was rejected; the same field is asked again.
    Invalid(String),
    /// All fields are collected.
    Complete(CategoryFields),
}

/// A category being created or edited through private messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryWizard {
    /// Category being edited, `None` when adding.
    pub category_id: Option<i64>,
    pub scope: CategoryScope,
    /// Chat whose listing is shown when the wizard ends.
    pub chat_id: i64,
    step: WizardStep,
    name: String,
    keywords: String,
    previous: Option<CategoryFields>,
}

impl CategoryWizard {
    /// Starts a wizard adding a category to `scope`.
    #[must_use]
    pub const fn add(scope: CategoryScope, chat_id: i64) -> Self {
        Self {
            category_id: None,
            scope,
            chat_id,
            step: WizardStep::Name,
            name: String::new(),
            keywords: String::new(),
            previous: None,
        }
    }

    /// Starts a wizard editing `category`; each prompt shows the old value.
    #[must_use]
    pub fn edit(category: &Category, scope: CategoryScope, chat_id: i64) -> Self {
        Self {
            category_id: Some(category.id),
            scope,
            chat_id,
            step: WizardStep::Name,
            name: String::new(),
            keywords: String::new(),
            previous: Some(CategoryFields {
                name: category.name.clone(),
                keywords: category.keywords.clone(),
                response: category.response.clone(),
            }),
        }
    }

    #[must_use]
    pub const fn step(&self) -> WizardStep {
        self.step
    }

    /// Prompt for the current step.
    #[must_use]
    pub fn prompt(&self) -> String {
        let (old, ask) = match self.step {
            WizardStep::Name => (
                self.previous.as_ref().map(|p| p.name.as_str()),
                "Enter the category name:",
            ),
            WizardStep::Keywords => (
                self.previous.as_ref().map(|p| p.keywords.as_str()),
                "Enter keywords separated by commas:",
            ),
            WizardStep::Response => (
                self.previous.as_ref().map(|p| p.response.as_str()),
                "Enter the response text:",
            ),
        };

        match old {
            Some(old) => format!("Old value: {old}\n{ask}"),
            None => ask.to_owned(),
        }
    }

    /// Feeds one answer into the wizard.
    pub fn answer(&mut self, input: &str) -> WizardReply {
        let input = input.trim();

        match self.step {
            WizardStep::Name => {
                if input.is_empty() {
                    return WizardReply::Invalid("Category name cannot be empty.".to_owned());
                }
                input.clone_into(&mut self.name);
                self.step = WizardStep::Keywords;
                WizardReply::Prompt(self.prompt())
            }
            WizardStep::Keywords => {
                input.clone_into(&mut self.keywords);
                self.step = WizardStep::Response;
                WizardReply::Prompt(self.prompt())
            }
            WizardStep::Response => {
                if input.is_empty() {
                    return WizardReply::Invalid("Response cannot be empty.".to_owned());
                }
                WizardReply::Complete(CategoryFields {
                    name: std::mem::take(&mut self.name),
                    keywords: std::mem::take(&mut self.keywords),
                    response: input.to_owned(),
                })
            }
        }
    }
}
