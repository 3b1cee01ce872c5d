use siphon::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::SyncStarted {
                source_id,
                name,
                max_results,
            } => {
                tracing::info!(
                    source_id = %source_id,
                    name = %name,
                    max_results = ?max_results,
                    "Syncing source"
                );
            }

            SyncProgress::FetchedPayload {
                source_id,
                fetched_so_far,
            } => {
                tracing::trace!(source_id = %source_id, fetched_so_far, "Fetched payload");
            }

            SyncProgress::ItemFailed {
                source_id,
                reference,
                error,
            } => {
                tracing::warn!(
                    source_id = %source_id,
                    reference = %reference,
                    error = %error,
                    "Failed to normalize item"
                );
            }

            SyncProgress::Committing {
                source_id,
                inserts,
                updates,
            } => {
                tracing::debug!(source_id = %source_id, inserts, updates, "Committing batch");
            }

            SyncProgress::Committed {
                source_id,
                inserted,
                updated,
                skipped,
                failed,
            } => {
                tracing::info!(
                    source_id = %source_id,
                    inserted,
                    updated,
                    skipped,
                    failed,
                    "Sync committed"
                );
            }

            SyncProgress::SkippedInactive { source_id, name } => {
                tracing::info!(source_id = %source_id, name = %name, "Source inactive, skipped");
            }

            SyncProgress::SyncingSources { count, concurrency } => {
                tracing::info!(count, concurrency, "Syncing sources");
            }

            SyncProgress::SourceSynced { source_id, error } => match error {
                Some(error) => {
                    tracing::warn!(source_id = %source_id, error = %error, "Source sync failed")
                }
                None => tracing::debug!(source_id = %source_id, "Source synced"),
            },

            SyncProgress::SyncSourcesComplete { successful, failed } => {
                tracing::info!(successful, failed, "Sync complete");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
