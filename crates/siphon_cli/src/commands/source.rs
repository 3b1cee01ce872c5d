//! Source management commands.

use clap::Subcommand;
use console::style;
use sea_orm::DatabaseConnection;
use tabled::Tabled;
use uuid::Uuid;

use siphon::adapter::{ResolvedSource, default_registry};
use siphon::store::{SourceFilter, SourceOverrides, sources};
use siphon::sync::state::{ITEMS_PROCESSED, LAST_ERROR};
use siphon::{ConfigMap, Platform, SourceModel};

use super::entity::report_bulk;
use super::output::{OutputFormat, print_rows, render, truncate};
use super::{ActiveFlags, format_timestamp};
use crate::config::Config;

/// Source management subcommands.
#[derive(Subcommand)]
pub enum SourceAction {
    /// Add a source to an entity from a platform URL
    ///
    /// The URL decides the platform and source type, e.g. a YouTube channel,
    /// a feed URL, a GitHub repository or a subreddit.
    Add {
        /// Owning entity
        #[arg(short, long)]
        entity_id: Uuid,

        /// Platform URL
        #[arg(short, long)]
        url: String,

        /// Display name (defaults to the resolved name)
        #[arg(short, long)]
        name: Option<String>,

        /// Adapter settings as a JSON object, e.g. '{"stream": "issues"}'
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show what a URL resolves to without creating anything
    Resolve {
        /// Platform URL
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// List sources
    List {
        /// Only sources of this entity
        #[arg(short, long)]
        entity_id: Option<Uuid>,

        /// Only sources on this platform (youtube, rss, github, reddit)
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Only sources whose name contains this text
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        active: ActiveFlags,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Include sources in syncs again
    Activate {
        /// Source ids
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Skip sources unless a sync is forced
    Deactivate {
        /// Source ids
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

/// Display struct for source listing.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct SourceDisplay {
    #[tabled(rename = "ID")]
    id: Uuid,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Type")]
    source_type: String,
    #[tabled(rename = "Identifier")]
    source_identifier: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Processed")]
    items_processed: i64,
    #[tabled(rename = "Last Sync")]
    last_synced_at: String,
    #[tabled(rename = "Last Error")]
    last_error: String,
}

impl From<&SourceModel> for SourceDisplay {
    fn from(source: &SourceModel) -> Self {
        Self {
            id: source.id,
            name: source.name.clone(),
            platform: source.platform.to_string(),
            source_type: source.source_type.to_string(),
            source_identifier: source.source_identifier.clone(),
            active: source.active,
            items_processed: source.metadata.get_i64(ITEMS_PROCESSED).unwrap_or(0),
            last_synced_at: format_timestamp(source.last_synced_at.as_ref()),
            last_error: truncate(source.metadata.get_str(LAST_ERROR).unwrap_or(""), 40),
        }
    }
}

/// Display struct for URL resolution.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct ResolvedDisplay {
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Type")]
    source_type: String,
    #[tabled(rename = "Identifier")]
    source_identifier: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Config")]
    config: String,
}

impl From<ResolvedSource> for ResolvedDisplay {
    fn from(resolved: ResolvedSource) -> Self {
        let config = if resolved.config.is_empty() {
            "-".to_string()
        } else {
            resolved.config.to_json().to_string()
        };
        Self {
            platform: resolved.platform.to_string(),
            source_type: resolved.source_type.to_string(),
            source_identifier: resolved.source_identifier,
            name: resolved.name,
            url: resolved.url,
            config,
        }
    }
}

/// Handle source management commands.
pub async fn handle_source(
    action: SourceAction,
    config: &Config,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SourceAction::Add {
            entity_id,
            url,
            name,
            config: settings,
        } => {
            let overrides = SourceOverrides {
                name,
                config: match settings.as_deref() {
                    Some(text) => ConfigMap::parse(text)?,
                    None => ConfigMap::new(),
                },
            };
            let registry = default_registry(&config.adapter_settings(false))?;
            let source = sources::create_from_url(db, &registry, entity_id, &url, overrides).await?;
            println!(
                "{} Added {} {} source '{}' {}",
                style("✓").green().bold(),
                source.platform,
                source.source_type,
                style(&source.name).cyan(),
                style(source.id).dim()
            );
        }
        SourceAction::Resolve { url, output } => {
            let registry = default_registry(&config.adapter_settings(false))?;
            let resolved = registry.resolve(&url)?;
            println!("{}", render(&[ResolvedDisplay::from(resolved)], output)?);
        }
        SourceAction::List {
            entity_id,
            platform,
            name,
            active,
            output,
        } => {
            let filter = SourceFilter {
                entity_id,
                platform,
                active: active.filter(),
                name_contains: name,
                ..Default::default()
            };
            let rows: Vec<SourceDisplay> = sources::list(db, &filter)
                .await?
                .iter()
                .map(SourceDisplay::from)
                .collect();
            print_rows(&rows, output, "No sources found.")?;
        }
        SourceAction::Activate { ids } => {
            let changed = sources::set_active(db, &ids, true).await?;
            report_bulk("Activated", changed, ids.len());
        }
        SourceAction::Deactivate { ids } => {
            let changed = sources::set_active(db, &ids, false).await?;
            report_bulk("Deactivated", changed, ids.len());
        }
    }
    Ok(())
}
