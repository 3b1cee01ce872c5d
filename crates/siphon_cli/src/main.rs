//! Siphon CLI - command-line interface for the content ingestion engine.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::entity::EntityAction;
use crate::commands::item::ItemAction;
use crate::commands::source::SourceAction;

#[derive(Parser)]
#[command(name = "siphon")]
#[command(version)]
#[command(
    about = "Incremental content ingestion from video, feed, code-hosting and forum platforms"
)]
#[command(
    long_about = "Siphon tracks entities (people, organizations, topics) across content \
platforms (YouTube, RSS/Atom feeds, GitHub, Reddit). Each entity owns sources; syncing \
a source pulls new and changed items into a local database without duplicating \
anything already stored."
)]
#[command(after_long_help = r#"EXAMPLES
    Track an entity and one of its feeds:
        $ siphon entity add "Rust Project" --type organization
        $ siphon source add --entity-id <ID> --url https://blog.rust-lang.org/feed.xml

    Follow issues instead of releases on a repository:
        $ siphon source add --entity-id <ID> --url https://github.com/rust-lang/rust \
            --config '{"stream": "issues"}'

    Sync one source, keeping only a few platform fields:
        $ siphon item sync --source-id <ID> --max-results 50 --fields url,author

    Sync everything, four sources at a time:
        $ siphon item sync-all --concurrency 4

    Items from the last week:
        $ siphon item list --published-since 7d

CONFIGURATION
    Siphon reads configuration from:
      1. ~/.config/siphon/config.toml (or $XDG_CONFIG_HOME/siphon/config.toml)
      2. ./siphon.toml
      3. Environment variables (SIPHON_* prefix, e.g., SIPHON_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    SIPHON_DATABASE_URL       Database connection string (default: ~/.local/state/siphon/siphon.db)
    SIPHON_GITHUB_TOKEN       GitHub personal access token
    SIPHON_SYNC_CONCURRENCY   Sources synced in parallel by sync-all
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage tracked entities
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },
    /// Manage an entity's platform sources
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Sync, curate and list items
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Ctrl+C cancels in-flight syncs; a second press exits
    shutdown::setup_shutdown_handler();

    // Structured logging only when not attached to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("siphon=info,siphon_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();

    // Commands that don't need the database
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database location; set SIPHON_DATABASE_URL")?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Entity { action } => {
            let db = siphon::connect_and_migrate(&database_url).await?;
            commands::entity::handle_entity(action, &db).await?;
        }
        Commands::Source { action } => {
            let db = siphon::connect_and_migrate(&database_url).await?;
            commands::source::handle_source(action, &config, &db).await?;
        }
        Commands::Item { action } => {
            let db = Arc::new(siphon::connect_and_migrate(&database_url).await?);
            commands::item::handle_item(action, &config, &db).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

/// Create the parent directory of a file-backed SQLite database.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    if db_path.is_empty() || db_path.starts_with(':') {
        return Ok(());
    }
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_sync_flags() {
        let id = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "siphon",
            "item",
            "sync",
            "--source-id",
            id.to_string().as_str(),
            "--max-results",
            "5",
            "--fields",
            "url,author",
            "--force",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Item {
                action: ItemAction::Sync { source_id, force: true, .. }
            } if source_id == id
        ));
    }

    #[test]
    fn parses_comma_separated_identifiers() {
        let id = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "siphon",
            "item",
            "deactivate",
            "--source-id",
            id.to_string().as_str(),
            "--identifiers",
            "a,b,c",
        ])
        .unwrap();
        match cli.command {
            Commands::Item {
                action: ItemAction::Deactivate { identifiers, .. },
            } => assert_eq!(identifiers, ["a", "b", "c"]),
            _ => panic!("expected item deactivate"),
        }
    }

    #[test]
    fn rejects_zero_max_results() {
        let id = uuid::Uuid::new_v4();
        let result = Cli::try_parse_from([
            "siphon",
            "item",
            "sync",
            "--source-id",
            id.to_string().as_str(),
            "--max-results",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn active_and_inactive_conflict() {
        let result = Cli::try_parse_from(["siphon", "item", "list", "--active", "--inactive"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_entity_type() {
        let result = Cli::try_parse_from(["siphon", "entity", "add", "x", "--type", "planet"]);
        assert!(result.is_err());
    }

    #[test]
    fn ensure_sqlite_dir_ignores_memory_and_other_schemes() {
        assert!(ensure_sqlite_dir("sqlite::memory:").is_ok());
        assert!(ensure_sqlite_dir("postgres://localhost/siphon").is_ok());
    }
}
