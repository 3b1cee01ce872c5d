//! Source metadata written by a committed run.

use chrono::{DateTime, Utc};

use crate::store::SourceStateUpdate;
use crate::value::ConfigMap;

use super::types::SyncReport;

/// Cumulative raw payloads consumed across all runs.
pub const ITEMS_PROCESSED: &str = "items_processed";
/// Summary of the last run's per-item failures; absent after a clean run.
pub const LAST_ERROR: &str = "last_error";
pub const LAST_INSERTED: &str = "last_inserted";
pub const LAST_UPDATED: &str = "last_updated";
pub const LAST_SKIPPED: &str = "last_skipped";
pub const LAST_FAILED: &str = "last_failed";
pub const LAST_DURATION_MS: &str = "last_duration_ms";

/// Failure reasons quoted in `last_error`.
const MAX_QUOTED_FAILURES: usize = 3;

/// State update for a run that is about to commit.
pub(crate) fn state_update(
    previous: &ConfigMap,
    report: &SyncReport,
    synced_at: DateTime<Utc>,
) -> SourceStateUpdate {
    let processed = previous
        .get_i64(ITEMS_PROCESSED)
        .unwrap_or(0)
        .saturating_add(report.fetched as i64);

    let update = SourceStateUpdate::new(synced_at)
        .with_cursor(report.new_cursor.clone())
        .set(ITEMS_PROCESSED, processed)
        .set(LAST_INSERTED, report.inserted)
        .set(LAST_UPDATED, report.updated)
        .set(LAST_SKIPPED, report.skipped)
        .set(LAST_FAILED, report.failures.len())
        .set(LAST_DURATION_MS, report.duration.as_millis() as i64);

    match failure_summary(report) {
        Some(summary) => update.set(LAST_ERROR, summary),
        None => update.remove(LAST_ERROR),
    }
}

fn failure_summary(report: &SyncReport) -> Option<String> {
    if report.failures.is_empty() {
        return None;
    }
    let quoted: Vec<String> = report
        .failures
        .iter()
        .take(MAX_QUOTED_FAILURES)
        .map(|f| format!("{}: {}", f.reference, f.reason))
        .collect();
    let more = report.failures.len().saturating_sub(MAX_QUOTED_FAILURES);
    let mut summary = format!(
        "{} item(s) failed to normalize: {}",
        report.failures.len(),
        quoted.join("; ")
    );
    if more > 0 {
        summary.push_str(&format!(" (+{more} more)"));
    }
    Some(summary)
}
