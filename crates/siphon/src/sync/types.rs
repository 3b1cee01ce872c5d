//! Sync options, reports and shared constants.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::model::{FieldProjection, MaxResults};

/// Default number of sources synced at once by `run_many`.
pub const DEFAULT_SYNC_CONCURRENCY: usize = 4;

/// Maximum backoff delay in milliseconds when rate limited.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Retries for a single upstream request before the run gives up.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Options for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Bound on raw payloads consumed, not on items written.
    pub max_results: MaxResults,
    /// Raw fields to keep on each item.
    pub fields: FieldProjection,
    /// Sync even if the source is inactive.
    pub force: bool,
    /// Checked between payloads; once set the run stops without committing.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl SyncOptions {
    #[must_use]
    pub fn max_results(mut self, max_results: MaxResults) -> Self {
        self.max_results = max_results;
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: FieldProjection) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Items were fetched and the source state committed.
    Completed,
    /// The source is inactive and the run was not forced.
    SkippedInactive,
}

/// A payload that could not be turned into an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Identifier if one could be read, else the payload position.
    pub reference: String,
    pub reason: String,
}

/// Result of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub source_id: Uuid,
    pub outcome: SyncOutcome,
    pub inserted: usize,
    pub updated: usize,
    /// Unchanged items plus repeats of an identifier within the run.
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
    /// Raw payloads consumed from upstream.
    pub fetched: usize,
    pub new_cursor: Option<String>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

impl SyncReport {
    pub(crate) fn skipped_inactive(source_id: Uuid, cursor: Option<String>) -> Self {
        Self {
            source_id,
            outcome: SyncOutcome::SkippedInactive,
            inserted: 0,
            updated: 0,
            skipped: 0,
            failures: Vec::new(),
            fetched: 0,
            new_cursor: cursor,
            duration: Duration::ZERO,
        }
    }

    /// Number of items whose stored row changed.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn serialize_duration_ms<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
