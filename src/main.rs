//! Trigger Bot - Main Entry Point
//!
//! Reads chat updates as JSON lines on stdin and writes outbound messages as
//! JSON lines on stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use trigger_bot::commands::CommandHandler;
use trigger_bot::config::BotSettings;
use trigger_bot::gateway::{Gateway, JsonLinesDelivery};
use trigger_bot::storage::Database;
use trigger_bot::triggers::{Delivery, SystemClock, TriggerEngine};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Keyword trigger bot with rate-limited auto-responses.
#[derive(Parser, Debug)]
#[command(name = "trigger_bot")]
#[command(about = "Answer keyword-matched chat messages with rate-limited responses")]
#[command(version)]
struct Args {
    /// SQLite database URL (overrides DATABASE_URL).
    #[arg(short, long)]
    database_url: Option<String>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.log_format);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings = BotSettings::from_env_with_defaults();
    if let Some(url) = args.database_url {
        settings.database_url = url;
    }
    settings
        .validate()
        .context("Invalid bot settings")?;

    let db = Database::connect(&settings.database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run database migrations")?;

    let delivery: Arc<dyn Delivery> = Arc::new(JsonLinesDelivery::stdout());
    let engine = TriggerEngine::new(
        Arc::new(db.clone()),
        Arc::clone(&delivery),
        Arc::new(SystemClock),
        settings.engine_config(),
    );
    let commands = Arc::new(CommandHandler::new(settings.command_prefix.clone(), db.clone()));
    let gateway = Gateway::new(db.clone(), engine, commands, delivery);

    info!(
        threshold = settings.threshold_count,
        window_minutes = settings.window_minutes,
        strict = settings.strict_rate_limit,
        "Starting trigger bot..."
    );
    info!("Command prefix: {}", settings.command_prefix);

    let summary = gateway
        .run(BufReader::new(tokio::io::stdin()))
        .await
        .context("Update intake failed")?;

    db.close().await;
    info!(updates = summary.updates, "Trigger bot stopped");

    Ok(())
}

/// Initializes logging on stderr; stdout carries outbound messages.
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
