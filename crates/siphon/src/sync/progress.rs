//! Progress events emitted by the sync coordinator.

use uuid::Uuid;

/// Progress events emitted during sync runs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A run acquired its lease and loaded the source.
    SyncStarted {
        /// The source being synced.
        source_id: Uuid,
        /// Display name of the source.
        name: String,
        /// Payload bound for the run, if any.
        max_results: Option<usize>,
    },

    /// A raw payload was pulled from upstream.
    FetchedPayload {
        /// The source being synced.
        source_id: Uuid,
        /// Running count of payloads consumed.
        fetched_so_far: usize,
    },

    /// A payload could not be normalized; the run continues.
    ItemFailed {
        /// The source being synced.
        source_id: Uuid,
        /// Payload identifier or position.
        reference: String,
        /// Why normalization failed.
        error: String,
    },

    /// Staged writes are about to be committed.
    Committing {
        /// The source being synced.
        source_id: Uuid,
        /// Rows to insert.
        inserts: usize,
        /// Rows to update.
        updates: usize,
    },

    /// The batch and source state were committed.
    Committed {
        /// The source that was synced.
        source_id: Uuid,
        /// Items inserted.
        inserted: usize,
        /// Items updated.
        updated: usize,
        /// Items skipped.
        skipped: usize,
        /// Payloads that failed to normalize.
        failed: usize,
    },

    /// The source is inactive and the run was not forced.
    SkippedInactive {
        /// The source that was skipped.
        source_id: Uuid,
        /// Display name of the source.
        name: String,
    },

    /// Syncing multiple sources.
    SyncingSources {
        /// Number of sources to sync.
        count: usize,
        /// Concurrency level.
        concurrency: usize,
    },

    /// A source in a multi-source run finished.
    SourceSynced {
        /// The source that finished.
        source_id: Uuid,
        /// Error message if the run failed.
        error: Option<String>,
    },

    /// Completed syncing multiple sources.
    SyncSourcesComplete {
        /// Number of successful runs.
        successful: usize,
        /// Number of failed runs.
        failed: usize,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use siphon::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn report(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::Warning { message: "slow upstream".into() });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_emit_with_callback() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let callback: ProgressCallback = Box::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::SyncingSources {
                count: 2,
                concurrency: 1,
            },
        );
        emit(
            Some(&callback),
            SyncProgress::Warning {
                message: "w".to_string(),
            },
        );

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        emit(
            None,
            SyncProgress::SyncSourcesComplete {
                successful: 0,
                failed: 0,
            },
        );
    }
}
