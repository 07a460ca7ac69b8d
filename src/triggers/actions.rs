//! Actions taken when a category fires.

use super::delivery::{Delivery, DeliveryError};
use super::message::InboundMessage;

/// Something the bot does in response to a fired category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Reply in the chat the message came from.
    SendMessage { text: String },
}

impl Action {
    #[must_use]
    pub fn send_message(text: impl Into<String>) -> Self {
        Self::SendMessage { text: text.into() }
    }

    /// Executes the action for `message`.
    ///
    /// # Errors
    ///
    /// Returns the delivery error; the caller decides whether to log it.
    pub async fn execute(
        &self,
        message: &InboundMessage,
        delivery: &dyn Delivery,
    ) -> Result<(), DeliveryError> {
        match self {
            Self::SendMessage { text } => delivery.send(message.chat_id, text).await,
        }
    }
}
