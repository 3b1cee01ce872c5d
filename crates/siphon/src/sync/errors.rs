use thiserror::Error;
use uuid::Uuid;

use crate::adapter::{FetchError, RegistryError};
use crate::store::StoreError;

/// Errors that end a sync run.
///
/// A run that returns any of these has not changed the source's cursor or
/// metadata. Per-item normalization problems are not errors; they are
/// collected in [`SyncReport::failures`](super::SyncReport::failures).
#[derive(Debug, Error)]
pub enum SyncError {
    /// No adapter for the platform, or the adapter cannot run as configured.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The upstream listing could not be read.
    #[error("Upstream fetch failed: {source}")]
    UpstreamFetch {
        retryable: bool,
        #[source]
        source: FetchError,
    },

    /// The batch commit failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Another run holds the lease for this source.
    #[error("Sync already in progress for source {source_id}")]
    SyncInProgress { source_id: Uuid },

    /// The shutdown flag was raised before the run finished.
    #[error("Sync cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn source_not_found(source_id: Uuid) -> Self {
        Self::NotFound {
            resource: format!("source id={source_id}"),
        }
    }

    /// Whether the caller may retry the run unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamFetch { retryable, .. } => *retryable,
            Self::Persistence(err) => err.is_transient(),
            Self::SyncInProgress { .. } => true,
            _ => false,
        }
    }
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Configuration { message } => Self::Configuration { message },
            other => Self::UpstreamFetch {
                retryable: other.is_retryable(),
                source: other,
            },
        }
    }
}

impl From<RegistryError> for SyncError {
    fn from(err: RegistryError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
