//! Update intake loop.
//!
//! Reads one JSON update per line and processes each in its own task:
//! - group messages go through the trigger engine
//! - private messages go to the admin command handler; replies are sent back
//!   to the private chat
//! - membership changes register or remove the chat
//!
//! Tasks are independent; no ordering is kept between them. The loop ends at
//! end of input or on the shutdown signal and then waits for running tasks.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use super::update::{Registration, Update};
use crate::commands::CommandHandler;
use crate::storage::{chats, Database, StorageError};
use crate::trace::TraceContext;
use crate::triggers::{Delivery, DeliveryError, InboundMessage, TriggerEngine};

/// Errors that end the processing of one update, or the whole loop.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to read updates: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to send reply: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines parsed into updates.
    pub updates: usize,
    /// Lines that were not valid UTF-8 or not valid updates.
    pub rejected: usize,
    /// Updates whose task failed.
    pub failed: usize,
}

/// Dispatches updates to the engine, the admin handler and the chat registry.
#[derive(Clone)]
pub struct Gateway {
    db: Database,
    engine: TriggerEngine,
    commands: Arc<CommandHandler>,
    delivery: Arc<dyn Delivery>,
}

impl Gateway {
    #[must_use]
    pub fn new(
        db: Database,
        engine: TriggerEngine,
        commands: Arc<CommandHandler>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            db,
            engine,
            commands,
            delivery,
        }
    }

    /// Runs until end of input or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails.
    pub async fn run<R>(&self, input: R) -> Result<RunSummary, GatewayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down");
        };
        self.run_until(input, shutdown).await
    }

    /// Runs until end of input or until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails. Undecodable or malformed
    /// lines are counted as rejected and skipped. Tasks already started are
    /// awaited first.
    pub async fn run_until<R, S>(&self, input: R, shutdown: S) -> Result<RunSummary, GatewayError>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        info!("Gateway started");

        let mut lines = input.split(b'\n');
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();
        tokio::pin!(shutdown);

        let read_result = loop {
            tokio::select! {
                () = &mut shutdown => break Ok(()),
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    record_task(joined, &mut summary);
                }
                line = lines.next_segment() => {
                    match line {
                        Ok(Some(bytes)) => match String::from_utf8(bytes) {
                            Ok(line) => self.accept(&line, &mut tasks, &mut summary),
                            Err(e) => {
                                warn!("Skipping update that is not valid UTF-8: {}", e);
                                summary.rejected += 1;
                            }
                        },
                        Ok(None) => {
                            debug!("End of input");
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            record_task(joined, &mut summary);
        }

        info!(
            updates = summary.updates,
            rejected = summary.rejected,
            failed = summary.failed,
            "Gateway stopped"
        );
        read_result?;
        Ok(summary)
    }

    fn accept(
        &self,
        line: &str,
        tasks: &mut JoinSet<Result<(), GatewayError>>,
        summary: &mut RunSummary,
    ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let update = match Update::from_line(line) {
            Ok(update) => update,
            Err(e) => {
                warn!("Skipping malformed update: {}", e);
                summary.rejected += 1;
                return;
            }
        };
        summary.updates += 1;

        let mut trace = TraceContext::new(update.event_type()).with_chat(update.chat_id());
        if let Some(user_id) = update.user_id() {
            trace = trace.with_user(user_id);
        }

        let span = trace.span();
        let gateway = self.clone();
        tasks.spawn(async move { gateway.dispatch(update, &trace).await }.instrument(span));
    }

    /// Processes a single update.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat registry or an admin reply fails. Trigger
    /// engine failures are logged by the engine and not returned.
    pub async fn dispatch(&self, update: Update, trace: &TraceContext) -> Result<(), GatewayError> {
        match update {
            Update::Message {
                chat_id,
                user_id,
                text,
                timestamp,
                private: false,
            } => {
                let message = InboundMessage {
                    chat_id,
                    user_id,
                    text,
                    timestamp,
                };
                if let Some(outcome) = self.engine.handle(&message, trace).await {
                    debug!(?outcome, "Message processed");
                }
                Ok(())
            }
            Update::Message {
                chat_id,
                user_id,
                text,
                private: true,
                ..
            } => {
                let Some(text) = text else {
                    return Ok(());
                };
                if let Some(result) = self.commands.try_handle(user_id, &text).await {
                    self.delivery.send(chat_id, &result.message).await?;
                }
                Ok(())
            }
            Update::Membership {
                chat_id,
                status,
                title,
            } => {
                match status.registration() {
                    Registration::Register => {
                        chats::register_chat(self.db.pool(), chat_id, title.as_deref()).await?;
                        info!(chat_id, "Bot added to chat");
                    }
                    Registration::Remove => {
                        if chats::remove_chat(self.db.pool(), chat_id).await? {
                            info!(chat_id, "Bot removed from chat");
                        }
                    }
                    Registration::Unchanged => {
                        debug!(chat_id, ?status, "Membership change ignored");
                    }
                }
                Ok(())
            }
        }
    }
}

fn record_task(
    joined: Result<Result<(), GatewayError>, tokio::task::JoinError>,
    summary: &mut RunSummary,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Update failed: {}", e);
            summary.failed += 1;
        }
        Err(e) => {
            error!("Update task panicked: {}", e);
            summary.failed += 1;
        }
    }
}
