//! Item commands: syncing sources, curating items and listing them.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use console::style;
use sea_orm::DatabaseConnection;
use tabled::Tabled;
use uuid::Uuid;

use siphon::activation::{self, ActivationReport};
use siphon::search::{self, DEFAULT_LIST_LIMIT, ItemFilter, ItemPage, Pagination, parse_since};
use siphon::store::{EntityFilter, SeaOrmItemStore, SourceFilter, entities, sources};
use siphon::sync::{SyncError, SyncOptions, SyncOutcome, SyncReport};
use siphon::{FieldProjection, ItemModel, MaxResults, SourceModel};

use super::output::{OutputFormat, print_rows, render, truncate};
use super::{ActiveFlags, coordinator, format_timestamp};
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::{is_shutdown_requested, shutdown_flag};

/// Failures listed per source before the rest are summarized.
const MAX_LISTED_FAILURES: usize = 10;

/// Options shared by `sync` and `sync-all`.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RunOptions {
    /// Stop after this many upstream payloads (default from config, else unbounded)
    #[arg(short = 'm', long)]
    max_results: Option<NonZeroUsize>,

    /// Comma-separated platform fields to keep (default: all)
    #[arg(short = 'f', long)]
    fields: Option<String>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long)]
    no_rate_limit: bool,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

impl RunOptions {
    fn sync_options(&self, config: &Config, force: bool) -> SyncOptions {
        let max_results = MaxResults::from(self.max_results.or(config.sync.max_results));
        let fields = self
            .fields
            .as_deref()
            .map_or(FieldProjection::All, FieldProjection::parse);

        SyncOptions::default()
            .max_results(max_results)
            .fields(fields)
            .force(force)
            .with_shutdown(shutdown_flag())
    }
}

/// Item subcommands.
#[derive(Subcommand)]
pub enum ItemAction {
    /// Pull new and changed items for one source
    Sync {
        /// Source to sync
        #[arg(short, long)]
        source_id: Uuid,

        /// Sync even if the source is inactive
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Sync every active source, several at a time
    SyncAll {
        /// Only sources of this entity
        #[arg(short, long)]
        entity_id: Option<Uuid>,

        /// Sources synced in parallel (default from config or 4)
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Mark items as active
    Activate {
        /// Source the items belong to
        #[arg(short, long)]
        source_id: Uuid,

        /// Comma-separated external identifiers
        #[arg(short, long, value_delimiter = ',', required = true)]
        identifiers: Vec<String>,
    },
    /// Mark items as inactive
    Deactivate {
        /// Source the items belong to
        #[arg(short, long)]
        source_id: Uuid,

        /// Comma-separated external identifiers
        #[arg(short, long, value_delimiter = ',', required = true)]
        identifiers: Vec<String>,
    },
    /// List stored items, newest first
    List {
        /// Only items of this source
        #[arg(short, long)]
        source_id: Option<Uuid>,

        #[command(flatten)]
        active: ActiveFlags,

        /// Only items published since (e.g. 12h, 7d, 2w, 2025-01-31)
        #[arg(short, long)]
        published_since: Option<String>,

        /// Only items whose title contains this text
        #[arg(short, long)]
        title_search: Option<String>,

        /// Page size
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u64,

        /// Items to skip
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

/// One row of a sync summary.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct RunDisplay {
    #[tabled(rename = "Source")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Fetched")]
    fetched: usize,
    #[tabled(rename = "New")]
    inserted: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Unchanged")]
    skipped: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Time")]
    duration: String,
    #[tabled(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RunDisplay {
    fn new(name: &str, result: &Result<SyncReport, SyncError>) -> Self {
        match result {
            Ok(report) => Self {
                name: name.to_string(),
                status: match report.outcome {
                    SyncOutcome::Completed if report.has_failures() => "partial".to_string(),
                    SyncOutcome::Completed => "ok".to_string(),
                    SyncOutcome::SkippedInactive => "inactive".to_string(),
                },
                fetched: report.fetched,
                inserted: report.inserted,
                updated: report.updated,
                skipped: report.skipped,
                failed: report.failures.len(),
                duration: format!("{:.1}s", report.duration.as_secs_f64()),
                error: None,
            },
            Err(e) => Self {
                name: name.to_string(),
                status: "error".to_string(),
                fetched: 0,
                inserted: 0,
                updated: 0,
                skipped: 0,
                failed: 0,
                duration: "-".to_string(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Display struct for item listing.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct ItemDisplay {
    #[tabled(rename = "Identifier")]
    external_identifier: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Published")]
    published_at: String,
    #[tabled(rename = "Active")]
    active: bool,
}

impl From<&ItemModel> for ItemDisplay {
    fn from(item: &ItemModel) -> Self {
        Self {
            external_identifier: truncate(&item.external_identifier, 32),
            title: truncate(&item.title, 60),
            published_at: format_timestamp(item.published_at.as_ref()),
            active: item.active,
        }
    }
}

/// Handle item commands.
pub async fn handle_item(
    action: ItemAction,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ItemAction::Sync {
            source_id,
            force,
            run,
        } => sync_one(source_id, force, &run, config, db).await,
        ItemAction::SyncAll {
            entity_id,
            concurrency,
            run,
        } => {
            let concurrency = concurrency.unwrap_or(config.sync.concurrency);
            sync_all(entity_id, concurrency, &run, config, db).await
        }
        ItemAction::Activate {
            source_id,
            identifiers,
        } => {
            let store = SeaOrmItemStore::new(Arc::clone(db));
            let report = activation::activate(&store, source_id, &identifiers).await?;
            print_activation(&report);
            Ok(())
        }
        ItemAction::Deactivate {
            source_id,
            identifiers,
        } => {
            let store = SeaOrmItemStore::new(Arc::clone(db));
            let report = activation::deactivate(&store, source_id, &identifiers).await?;
            print_activation(&report);
            Ok(())
        }
        ItemAction::List {
            source_id,
            active,
            published_since,
            title_search,
            limit,
            offset,
            output,
        } => {
            let mut filter = ItemFilter::default();
            if let Some(source_id) = source_id {
                filter = filter.source(source_id);
            }
            if let Some(active) = active.filter() {
                filter = filter.active(active);
            }
            if let Some(since) = published_since.as_deref() {
                filter = filter.published_since(parse_since(since, Utc::now())?);
            }
            if let Some(needle) = title_search {
                filter = filter.title_contains(needle);
            }

            let store = SeaOrmItemStore::new(Arc::clone(db));
            let page = search::search(&store, &filter, Pagination::new(limit, offset)).await?;
            print_page(&page, output)
        }
    }
}

async fn sync_one(
    source_id: Uuid,
    force: bool,
    run: &RunOptions,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = sources::get(db.as_ref(), source_id).await?.name;
    let coordinator = coordinator(config, db, run.no_rate_limit)?;
    let options = run.sync_options(config, force);

    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();
    let result = coordinator.run(source_id, &options, Some(&callback)).await;
    reporter.finish();

    if matches!(result, Err(SyncError::Cancelled)) {
        eprintln!("{} Sync cancelled, nothing was written.", style("⚠").yellow());
    }
    print_runs(&[(name, result)], run.output)
}

async fn sync_all(
    entity_id: Option<Uuid>,
    concurrency: usize,
    run: &RunOptions,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = active_sources(db, entity_id).await?;
    if targets.is_empty() {
        println!("No active sources to sync.");
        return Ok(());
    }

    let coordinator = coordinator(config, db, run.no_rate_limit)?;
    let options = run.sync_options(config, false);
    let ids: Vec<Uuid> = targets.iter().map(|s| s.id).collect();
    let names: HashMap<Uuid, String> = targets.into_iter().map(|s| (s.id, s.name)).collect();

    let reporter = Arc::new(ProgressReporter::new());
    let callback = reporter.as_callback();
    let results = coordinator
        .run_many(&ids, &options, concurrency, Some(&callback))
        .await;
    reporter.finish();

    if is_shutdown_requested() {
        eprintln!(
            "{} Shutdown requested; cancelled sources were left unchanged.",
            style("⚠").yellow()
        );
    }

    let runs: Vec<(String, Result<SyncReport, SyncError>)> = results
        .into_iter()
        .map(|(id, result)| {
            let name = names.get(&id).cloned().unwrap_or_else(|| id.to_string());
            (name, result)
        })
        .collect();
    print_runs(&runs, run.output)
}

/// Active sources of active entities, or of `entity_id` when given.
async fn active_sources(
    db: &DatabaseConnection,
    entity_id: Option<Uuid>,
) -> Result<Vec<SourceModel>, Box<dyn std::error::Error>> {
    let filter = SourceFilter {
        entity_id,
        active: Some(true),
        ..Default::default()
    };
    let candidates = sources::list(db, &filter).await?;

    if entity_id.is_some() {
        return Ok(candidates);
    }

    let active_entities: HashSet<Uuid> = entities::list(
        db,
        &EntityFilter {
            active: Some(true),
            ..Default::default()
        },
    )
    .await?
    .into_iter()
    .map(|e| e.id)
    .collect();

    Ok(candidates
        .into_iter()
        .filter(|s| active_entities.contains(&s.entity_id))
        .collect())
}

fn print_runs(
    runs: &[(String, Result<SyncReport, SyncError>)],
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<RunDisplay> = runs
        .iter()
        .map(|(name, result)| RunDisplay::new(name, result))
        .collect();
    println!("{}", render(&rows, output)?);

    if output == OutputFormat::Table {
        for (name, result) in runs {
            match result {
                Ok(report) if report.has_failures() => {
                    eprintln!(
                        "{} {} item(s) of '{}' could not be read:",
                        style("⚠").yellow(),
                        report.failures.len(),
                        name
                    );
                    for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
                        eprintln!("  - {}: {}", failure.reference, failure.reason);
                    }
                    if report.failures.len() > MAX_LISTED_FAILURES {
                        eprintln!(
                            "  ... and {} more",
                            report.failures.len() - MAX_LISTED_FAILURES
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => eprintln!("{} {}: {}", style("✗").red().bold(), name, e),
            }
        }
    }

    let failed = runs.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        return Err(format!("{} of {} source(s) failed to sync", failed, runs.len()).into());
    }
    Ok(())
}

fn print_activation(report: &ActivationReport) {
    let verb = if report.active {
        "Activated"
    } else {
        "Deactivated"
    };
    println!(
        "{} {} {} item(s)",
        style("✓").green().bold(),
        verb,
        report.matched.len()
    );
    if !report.is_complete() {
        println!(
            "{} Not found in source {}: {}",
            style("⚠").yellow(),
            report.source_id,
            report.unmatched.join(", ")
        );
    }
}

fn print_page(page: &ItemPage, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(page)?),
        OutputFormat::Table => {
            let rows: Vec<ItemDisplay> = page.items.iter().map(ItemDisplay::from).collect();
            print_rows(&rows, output, "No items found.")?;
            if !rows.is_empty() {
                println!(
                    "Showing {}-{} of {}{}",
                    page.offset + 1,
                    page.offset + rows.len() as u64,
                    page.total,
                    if page.has_more() {
                        format!(" (next: --offset {})", page.offset + rows.len() as u64)
                    } else {
                        String::new()
                    }
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use siphon::sync::ItemFailure;

    use super::*;

    fn report() -> SyncReport {
        SyncReport {
            source_id: Uuid::new_v4(),
            outcome: SyncOutcome::Completed,
            inserted: 3,
            updated: 1,
            skipped: 2,
            failures: Vec::new(),
            fetched: 6,
            new_cursor: Some("g1".to_string()),
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn run_display_for_clean_run() {
        let row = RunDisplay::new("Blog", &Ok(report()));
        assert_eq!(row.status, "ok");
        assert_eq!(row.inserted, 3);
        assert_eq!(row.skipped, 2);
        assert_eq!(row.duration, "1.5s");
        assert!(row.error.is_none());
    }

    #[test]
    fn run_display_marks_partial_runs() {
        let mut partial = report();
        partial.failures.push(ItemFailure {
            reference: "#4".to_string(),
            reason: "missing identifier".to_string(),
        });
        let row = RunDisplay::new("Blog", &Ok(partial));
        assert_eq!(row.status, "partial");
        assert_eq!(row.failed, 1);
    }

    #[test]
    fn run_display_for_errors() {
        let source_id = Uuid::new_v4();
        let row = RunDisplay::new("Blog", &Err(SyncError::SyncInProgress { source_id }));
        assert_eq!(row.status, "error");
        assert!(row.error.unwrap().contains(&source_id.to_string()));
    }

    #[test]
    fn print_runs_fails_when_any_source_failed() {
        let runs = vec![
            ("ok".to_string(), Ok(report())),
            ("bad".to_string(), Err(SyncError::Cancelled)),
        ];
        let err = print_runs(&runs, OutputFormat::Json).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 source(s) failed to sync");
    }

    #[test]
    fn run_options_fall_back_to_config() {
        let config = Config {
            sync: crate::config::SyncConfig {
                max_results: NonZeroUsize::new(25),
                ..Default::default()
            },
            ..Default::default()
        };
        let run = RunOptions {
            max_results: None,
            fields: Some("url,author".to_string()),
            no_rate_limit: false,
            output: OutputFormat::Table,
        };

        let options = run.sync_options(&config, true);
        assert_eq!(options.max_results, MaxResults::Limit(NonZeroUsize::new(25).unwrap()));
        assert_eq!(options.fields, FieldProjection::only(["url", "author"]));
        assert!(options.force);
        assert!(options.shutdown.is_some());
    }
}
