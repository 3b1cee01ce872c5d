//! Incremental synchronization of sources.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `SyncReport`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`coordinator`] - `SyncCoordinator::run()` and `run_many()`
//! - [`lease`] - Per-source single-flight leases
//! - [`state`] - Metadata keys written after each committed run
//!
//! # Example
//!
//! ```ignore
//! use std::num::NonZeroUsize;
//!
//! use siphon::sync::{SyncCoordinator, SyncOptions};
//! use siphon::MaxResults;
//!
//! let limit = NonZeroUsize::new(10).unwrap();
//! let options = SyncOptions::default().max_results(MaxResults::limit(limit));
//! let report = coordinator.run(source_id, &options, None).await?;
//! println!("{} new, {} changed, {} unchanged", report.inserted, report.updated, report.skipped);
//! ```

pub mod coordinator;
mod errors;
pub mod lease;
mod progress;
pub mod state;
mod types;

pub use coordinator::SyncCoordinator;
pub use errors::{Result, SyncError};
pub use lease::{SourceLease, SourceLeases};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{ItemFailure, SyncOptions, SyncOutcome, SyncReport};

// Re-export constants
pub use types::{DEFAULT_MAX_RETRIES, DEFAULT_SYNC_CONCURRENCY, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};
