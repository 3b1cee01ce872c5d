//! Platform adapters.
//!
//! Each adapter knows how to recognize its platform's URLs, page through a
//! source's items upstream, and map a raw payload onto a [`CanonicalItem`].
//! The sync coordinator only talks to adapters through [`SourceAdapter`] and
//! finds them through the [`AdapterRegistry`].

mod client;
mod errors;
mod rate_limit;
mod registry;
mod stream;
mod types;

#[cfg(feature = "rss")]
pub mod feed;
#[cfg(feature = "github")]
pub mod github;
#[cfg(feature = "reddit")]
pub mod reddit;
#[cfg(feature = "youtube")]
pub mod youtube;

use async_trait::async_trait;
use url::Url;

use crate::entity::platform::Platform;
use crate::entity::source::Model as SourceModel;
use crate::model::{CanonicalItem, FieldProjection, RawPayload};

pub use client::{DEFAULT_USER_AGENT, HttpFetcher};
pub use errors::{FetchError, NormalizationError, RegistryError, ResolveError};
pub use rate_limit::{ApiRateLimiter, RateLimit, default_rps_for_platform, rate_limits};
pub use registry::{AdapterRegistry, AdapterSettings, default_registry};
pub use stream::PayloadStream;
pub use types::{FetchOptions, Page, PageRequest, ResolvedSource};

/// Page size used when an adapter does not say otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A platform integration.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Recognize a URL.
    ///
    /// Returns `Ok(None)` for URLs belonging to other platforms, and an error
    /// for URLs on this platform that do not address a source.
    fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError>;

    /// Largest page the platform will serve.
    fn max_page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    /// Fetch one page of raw payloads, newest first.
    async fn fetch_page(
        &self,
        source: &SourceModel,
        request: PageRequest,
    ) -> Result<Page, FetchError>;

    /// Map one payload to a canonical item, keeping only projected raw fields.
    fn normalize(
        &self,
        payload: &RawPayload,
        fields: &FieldProjection,
    ) -> Result<CanonicalItem, NormalizationError>;

    /// Opaque cursor recorded for the newest item of a run.
    fn cursor_for(&self, item: &CanonicalItem) -> String {
        item.published_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| item.external_identifier.clone())
    }
}

/// Start a lazy payload sequence for `source`.
pub fn fetch<'a>(
    adapter: &'a dyn SourceAdapter,
    source: &'a SourceModel,
    options: &FetchOptions,
) -> PayloadStream<'a> {
    PayloadStream::new(adapter, source, options)
}

/// Shared text helpers for normalizers.
#[cfg(any(
    feature = "youtube",
    feature = "rss",
    feature = "github",
    feature = "reddit"
))]
pub(crate) mod text {
    /// Collapse runs of whitespace to single spaces.
    pub fn squash_whitespace(input: &str) -> String {
        input.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// First line of `input`, cut to `max_chars` characters.
    pub fn first_line(input: &str, max_chars: usize) -> String {
        let line = input.lines().next().unwrap_or_default().trim();
        if line.chars().count() > max_chars {
            let cut: String = line.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{cut}...")
        } else {
            line.to_string()
        }
    }

    /// Word and character counts of plain text.
    pub fn metrics(input: &str) -> (i64, i64) {
        (
            input.split_whitespace().count() as i64,
            input.chars().count() as i64,
        )
    }

    /// Non-empty trimmed text.
    pub fn non_empty(input: Option<&str>) -> Option<String> {
        input.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    }

}
