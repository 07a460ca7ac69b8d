//! JSON-lines delivery to an output stream.

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::triggers::{Delivery, DeliveryError};

#[derive(Serialize)]
struct OutboundLine<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Writes each sent message as one `{"chat_id":..,"text":..}` line.
#[derive(Debug)]
pub struct JsonLinesDelivery<W> {
    writer: Mutex<W>,
}

impl JsonLinesDelivery<Stdout> {
    /// Delivery writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesDelivery<W>
where
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Delivery for JsonLinesDelivery<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_vec(&OutboundLine { chat_id, text })?;
        line.push(b'\n');

        // one lock per line keeps concurrent sends from interleaving
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
