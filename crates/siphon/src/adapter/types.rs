use serde::Serialize;

use crate::entity::platform::Platform;
use crate::entity::source_type::SourceType;
use crate::model::{MaxResults, RawPayload};
use crate::value::ConfigMap;

/// Result of resolving a URL: everything needed to create a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSource {
    pub platform: Platform,
    pub source_type: SourceType,
    pub source_identifier: String,
    /// Canonical URL for the source.
    pub url: String,
    /// Suggested display name.
    pub name: String,
    /// Adapter settings implied by the URL.
    pub config: ConfigMap,
}

impl ResolvedSource {
    pub fn new(
        platform: Platform,
        source_type: SourceType,
        source_identifier: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let source_identifier = source_identifier.into();
        Self {
            platform,
            source_type,
            name: source_identifier.clone(),
            source_identifier,
            url: url.into(),
            config: ConfigMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: &str, value: impl Into<crate::value::ConfigValue>) -> Self {
        self.config.insert(key, value);
        self
    }
}

/// Options for one fetch sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub max_results: MaxResults,
}

/// Request for one upstream page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation token returned by the previous page; `None` for the first.
    pub token: Option<String>,
    /// Number of payloads wanted. Adapters may return fewer, or more when the
    /// platform has no page size control (feeds).
    pub page_size: usize,
}

/// One upstream page, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub payloads: Vec<RawPayload>,
    /// Token for the next page; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

impl Page {
    pub fn last(payloads: Vec<RawPayload>) -> Self {
        Self {
            payloads,
            next_token: None,
        }
    }

    pub fn with_next(payloads: Vec<RawPayload>, next_token: Option<String>) -> Self {
        Self {
            payloads,
            next_token,
        }
    }
}
