//! Offline administration tool for the trigger bot.
//!
//! Validates and imports seed files, shows a chat's effective categories and
//! prunes old trigger events.

use std::process::ExitCode;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};

use trigger_bot::config::{BotSettings, SeedFile};
use trigger_bot::storage::{categories, events, Database, TriggerStore};

/// Trigger bot administration tool.
#[derive(Parser, Debug)]
#[command(name = "trigger_admin")]
#[command(about = "Manage seed files and the trigger bot database")]
#[command(version)]
struct Args {
    /// SQLite database URL (overrides DATABASE_URL).
    #[arg(short, long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a seed file.
    Validate {
        /// Path to the seed file.
        #[arg(default_value = "seed.json")]
        file: String,

        /// Show every category.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write an example seed file.
    Example {
        /// Output path.
        #[arg(default_value = "seed.example.json")]
        output: String,
    },

    /// Import a seed file into the database.
    Import {
        /// Path to the seed file.
        file: String,
    },

    /// Show the effective categories of a chat.
    Resolve {
        /// Chat id.
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },

    /// List a chat's local and group categories, marking overridden ones.
    List {
        /// Chat id.
        #[arg(allow_hyphen_values = true)]
        chat_id: i64,
    },

    /// Delete trigger events older than the given number of days.
    Prune {
        #[arg(long)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("Could not load .env file: {}", e);
    }

    match args.command {
        Command::Validate { file, verbose } => validate_seed(&file, verbose),
        Command::Example { output } => generate_example(&output),
        Command::Import { file } => with_database(args.database_url, |db| import_seed(db, file)).await,
        Command::Resolve { chat_id } => {
            with_database(args.database_url, |db| resolve_chat(db, chat_id)).await
        }
        Command::List { chat_id } => with_database(args.database_url, |db| list_chat(db, chat_id)).await,
        Command::Prune { days } => with_database(args.database_url, |db| prune_events(db, days)).await,
    }
}

async fn with_database<F, Fut>(url: Option<String>, run: F) -> ExitCode
where
    F: FnOnce(Database) -> Fut,
    Fut: std::future::Future<Output = ExitCode>,
{
    let url = url.unwrap_or_else(|| BotSettings::from_env_with_defaults().database_url);

    let db = match Database::connect(&url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to connect to {url}: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = db.migrate().await {
        eprintln!("✗ Failed to run migrations: {e}");
        return ExitCode::FAILURE;
    }

    let code = run(db.clone()).await;
    db.close().await;
    code
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = SeedFile::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example seed file written to: {output_path}");
            println!(
                "\nThe file contains {} group(s), {} chat(s) and {} categories.",
                example.groups.len(),
                example.chats.len(),
                example.len()
            );
            println!("Categories set either 'chat_id' (local) or 'group' (a group key), never both.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_seed(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let seed = match SeedFile::load_from_file(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ Failed to load seed file: {e}");
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        for category in &seed.categories {
            let scope = match (&category.chat_id, &category.group) {
                (Some(chat_id), None) => format!("chat {chat_id}"),
                (None, Some(group)) => format!("group '{group}'"),
                _ => "invalid scope".to_owned(),
            };
            println!(
                "[{}] {} -> \"{}\"",
                scope,
                category.name,
                truncate(&category.response, 40)
            );
        }
        println!();
    }

    let errors = seed.validate_all();
    for e in &errors {
        println!("  ✗ Error: {e}");
    }

    if errors.is_empty() {
        println!(
            "✓ Seed file is valid: {} group(s), {} chat(s), {} categories",
            seed.groups.len(),
            seed.chats.len(),
            seed.len()
        );
        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {} error(s)", errors.len());
        ExitCode::FAILURE
    }
}

async fn import_seed(db: Database, path: String) -> ExitCode {
    let seed = match SeedFile::load_from_file(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("✗ Failed to load seed file: {e}");
            return ExitCode::FAILURE;
        }
    };

    match seed.import(&db).await {
        Ok(summary) => {
            println!(
                "✓ Imported {} group(s), {} chat(s), {} categories from {path}",
                summary.groups, summary.chats, summary.categories
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn resolve_chat(db: Database, chat_id: i64) -> ExitCode {
    let effective = match db.resolve_effective_categories(chat_id).await {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    if effective.is_empty() {
        println!("Chat {chat_id} has no categories.");
        return ExitCode::SUCCESS;
    }

    println!("Effective categories of chat {chat_id}:");
    for category in effective.iter() {
        let scope = if category.is_group() { "group" } else { "local" };
        println!(
            "  [{}] {} ({scope}): {} -> \"{}\"",
            category.id,
            category.name,
            category.keywords,
            truncate(&category.response, 40)
        );
    }
    ExitCode::SUCCESS
}

async fn list_chat(db: Database, chat_id: i64) -> ExitCode {
    let listing = match categories::list_categories_for_admin(db.pool(), chat_id).await {
        Ok(listing) => listing,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Local categories of chat {chat_id}:");
    for category in &listing.local {
        println!("  [{}] {}: {}", category.id, category.name, category.keywords);
    }
    println!("Group categories:");
    for entry in &listing.group {
        let marker = if entry.shadowed { " (overridden)" } else { "" };
        println!(
            "  [{}] {}{marker}: {}",
            entry.category.id, entry.category.name, entry.category.keywords
        );
    }
    ExitCode::SUCCESS
}

async fn prune_events(db: Database, days: u32) -> ExitCode {
    let cutoff = Utc::now() - Duration::days(i64::from(days));

    match events::prune_older_than(db.pool(), cutoff).await {
        Ok(removed) => {
            println!("✓ Removed {removed} trigger event(s) older than {days} day(s)");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to prune events: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
