//! Outbound message delivery.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur while sending a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fire-and-forget message sending.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Sends `text` to a chat. No delivery confirmation is reported.
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}

/// A message captured by [`MemoryDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
}

/// Delivery that keeps sent messages in memory.
#[derive(Debug, Default)]
pub struct MemoryDelivery {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl MemoryDelivery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the messages sent so far.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(format!("chat {chat_id} unavailable")));
        }
        self.sent.lock().await.push(SentMessage {
            chat_id,
            text: text.to_owned(),
        });
        Ok(())
    }
}
