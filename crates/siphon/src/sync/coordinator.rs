//! The sync run: fetch, normalize, dedup, commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::adapter::{self, AdapterRegistry, FetchOptions, SourceAdapter};
use crate::entity::item::Model as ItemModel;
use crate::entity::source::Model as SourceModel;
use crate::model::{CanonicalItem, FieldProjection};
use crate::store::{ItemRecord, ItemStore, ItemUpdate, UpsertBatch};

use super::errors::{Result, SyncError};
use super::lease::SourceLeases;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::state;
use super::types::{ItemFailure, SyncOptions, SyncOutcome, SyncReport};

/// Payloads pulled and normalized for one run.
#[derive(Debug, Default)]
struct Collected {
    items: Vec<CanonicalItem>,
    failures: Vec<ItemFailure>,
    /// Identifiers already seen earlier in the run.
    repeats: usize,
    fetched: usize,
    cursor: Option<String>,
}

/// Writes staged for one run.
#[derive(Debug)]
struct Staged {
    batch: UpsertBatch,
    unchanged: usize,
}

/// Runs syncs for sources against one store and adapter registry.
///
/// Clones share the same leases, so at most one run per source is in flight
/// across all clones.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn ItemStore>,
    registry: Arc<AdapterRegistry>,
    leases: SourceLeases,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("registry", &self.registry)
            .field("leases", &self.leases)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn ItemStore>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            registry,
            leases: SourceLeases::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn leases(&self) -> &SourceLeases {
        &self.leases
    }

    /// Sync one source.
    ///
    /// Items are processed in the order the adapter yields them. Payloads
    /// that fail to normalize are recorded in the report and skipped. The
    /// staged batch and the source's cursor and metadata are committed
    /// together; on any error nothing about the source changes.
    ///
    /// # Errors
    ///
    /// - `SyncInProgress` if another run holds this source's lease.
    /// - `NotFound` if the source does not exist.
    /// - `Configuration` if no adapter serves the platform.
    /// - `UpstreamFetch` if a page could not be fetched.
    /// - `Cancelled` if the shutdown flag was raised mid-run.
    /// - `Persistence` if the commit failed.
    #[tracing::instrument(
        skip(self, options, on_progress),
        fields(max_results = %options.max_results)
    )]
    pub async fn run(
        &self,
        source_id: Uuid,
        options: &SyncOptions,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncReport> {
        let _lease = self
            .leases
            .try_acquire(source_id)
            .ok_or(SyncError::SyncInProgress { source_id })?;
        let started = Instant::now();

        let source = self
            .store
            .load_source(source_id)
            .await?
            .ok_or_else(|| SyncError::source_not_found(source_id))?;

        if !source.active && !options.force {
            tracing::info!(name = %source.name, "Skipping inactive source");
            emit(
                on_progress,
                SyncProgress::SkippedInactive {
                    source_id,
                    name: source.name.clone(),
                },
            );
            return Ok(SyncReport::skipped_inactive(
                source_id,
                source.last_synced_cursor.clone(),
            ));
        }

        let adapter = self.registry.get(source.platform)?;

        emit(
            on_progress,
            SyncProgress::SyncStarted {
                source_id,
                name: source.name.clone(),
                max_results: options.max_results.remaining(0),
            },
        );

        let collected = collect(adapter.as_ref(), &source, options, on_progress).await?;

        let identifiers: Vec<String> = collected
            .items
            .iter()
            .map(|item| item.external_identifier.clone())
            .collect();
        let existing = self
            .store
            .find_by_identifiers(source_id, &identifiers)
            .await?;
        let staged = stage(source_id, collected.items, &existing, &options.fields);

        if options.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut report = SyncReport {
            source_id,
            outcome: SyncOutcome::Completed,
            inserted: staged.batch.inserts.len(),
            updated: staged.batch.updates.len(),
            skipped: staged.unchanged + collected.repeats,
            failures: collected.failures,
            fetched: collected.fetched,
            new_cursor: collected
                .cursor
                .or_else(|| source.last_synced_cursor.clone()),
            duration: started.elapsed(),
        };

        emit(
            on_progress,
            SyncProgress::Committing {
                source_id,
                inserts: report.inserted,
                updates: report.updated,
            },
        );

        let update = state::state_update(&source.metadata, &report, Utc::now());
        let outcome = self.store.commit_sync(&staged.batch, &update).await?;

        report.inserted = outcome.inserted_ids.len();
        report.updated = outcome.updated_ids.len();
        report.duration = started.elapsed();

        tracing::info!(
            name = %source.name,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failures.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Sync complete"
        );
        emit(
            on_progress,
            SyncProgress::Committed {
                source_id,
                inserted: report.inserted,
                updated: report.updated,
                skipped: report.skipped,
                failed: report.failures.len(),
            },
        );

        Ok(report)
    }

    /// Sync several sources, at most `concurrency` at a time.
    ///
    /// Results come back in input order. A failed source does not stop the
    /// others.
    pub async fn run_many(
        &self,
        source_ids: &[Uuid],
        options: &SyncOptions,
        concurrency: usize,
        on_progress: Option<&ProgressCallback>,
    ) -> Vec<(Uuid, Result<SyncReport>)> {
        let concurrency = concurrency.max(1);
        emit(
            on_progress,
            SyncProgress::SyncingSources {
                count: source_ids.len(),
                concurrency,
            },
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(source_ids.len());

        for &source_id in source_ids {
            let coordinator = self.clone();
            let options = options.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(SyncError::internal("Semaphore closed unexpectedly"));
                    }
                };
                // Callbacks are not Send across tasks; per-source events are
                // reported below as each handle completes.
                coordinator.run(source_id, &options, None).await
            });
            handles.push((source_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut successful = 0;
        let mut failed = 0;

        for (source_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SyncError::internal(format!("Sync task failed: {e}"))),
            };

            match &result {
                Ok(_) => successful += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(%source_id, error = %e, "Source sync failed");
                }
            }
            emit(
                on_progress,
                SyncProgress::SourceSynced {
                    source_id,
                    error: result.as_ref().err().map(ToString::to_string),
                },
            );
            results.push((source_id, result));
        }

        emit(
            on_progress,
            SyncProgress::SyncSourcesComplete { successful, failed },
        );
        results
    }
}

/// Pull payloads until the stream or the bound is exhausted.
async fn collect(
    adapter: &dyn SourceAdapter,
    source: &SourceModel,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<Collected> {
    let fetch_options = FetchOptions {
        max_results: options.max_results,
    };
    let mut stream = adapter::fetch(adapter, source, &fetch_options);
    let mut seen = HashSet::new();
    let mut collected = Collected::default();

    loop {
        if options.is_cancelled() {
            tracing::info!(fetched = collected.fetched, "Sync cancelled");
            return Err(SyncError::Cancelled);
        }

        let Some(payload) = stream.next().await? else {
            break;
        };
        collected.fetched += 1;
        emit(
            on_progress,
            SyncProgress::FetchedPayload {
                source_id: source.id,
                fetched_so_far: collected.fetched,
            },
        );

        match adapter.normalize(&payload, &options.fields) {
            Ok(item) => {
                if !seen.insert(item.external_identifier.clone()) {
                    collected.repeats += 1;
                    continue;
                }
                if collected.cursor.is_none() {
                    collected.cursor = Some(adapter.cursor_for(&item));
                }
                collected.items.push(item);
            }
            Err(err) => {
                let reference = payload.reference(collected.fetched);
                tracing::warn!(reference = %reference, error = %err, "Skipping payload");
                emit(
                    on_progress,
                    SyncProgress::ItemFailed {
                        source_id: source.id,
                        reference: reference.clone(),
                        error: err.to_string(),
                    },
                );
                collected.failures.push(ItemFailure {
                    reference,
                    reason: err.reason,
                });
            }
        }
    }

    tracing::debug!(
        fetched = collected.fetched,
        pages = stream.pages_fetched(),
        normalized = collected.items.len(),
        "Fetch complete"
    );
    Ok(collected)
}

/// Split items into inserts, updates and unchanged.
fn stage(
    source_id: Uuid,
    items: Vec<CanonicalItem>,
    existing: &HashMap<String, ItemModel>,
    projection: &FieldProjection,
) -> Staged {
    let mut batch = UpsertBatch::new(source_id);
    let mut unchanged = 0;

    for item in items {
        let Some(stored) = existing.get(&item.external_identifier) else {
            batch.inserts.push(ItemRecord::from(item));
            continue;
        };

        let record = ItemRecord {
            fields: merged_fields(stored, &item.raw_fields, projection),
            ..ItemRecord::from(item)
        };
        if is_unchanged(stored, &record) {
            unchanged += 1;
        } else {
            batch.updates.push(ItemUpdate {
                id: stored.id,
                record,
            });
        }
    }

    Staged { batch, unchanged }
}

/// Raw fields to store for an existing item.
///
/// A narrowed projection keeps stored fields it did not ask for.
fn merged_fields(
    stored: &ItemModel,
    fresh: &Map<String, Value>,
    projection: &FieldProjection,
) -> Map<String, Value> {
    match (projection, &stored.fields) {
        (FieldProjection::Only(_), Value::Object(previous)) => {
            let mut merged = previous.clone();
            merged.extend(fresh.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        }
        _ => fresh.clone(),
    }
}

fn is_unchanged(stored: &ItemModel, record: &ItemRecord) -> bool {
    stored.title == record.title
        && stored.content == record.content
        && stored.published_at.map(|ts| ts.with_timezone(&Utc)) == record.published_at
        && matches!(&stored.fields, Value::Object(fields) if *fields == record.fields)
}
