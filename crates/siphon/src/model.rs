//! Canonical item model shared by every platform adapter.
//!
//! Adapters turn platform payloads into [`CanonicalItem`]s. Everything
//! downstream (deduplication, change detection, persistence) only sees this
//! shape.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One platform-independent content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    /// Identifier assigned by the platform, stable across fetches.
    pub external_identifier: String,
    pub title: String,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Platform-specific fields, already narrowed by the field projection.
    pub raw_fields: Map<String, Value>,
}

impl CanonicalItem {
    pub fn new(external_identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_identifier: external_identifier.into(),
            title: title.into(),
            content: None,
            published_at: None,
            raw_fields: Map::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.raw_fields.insert(name.into(), value);
        self
    }
}

/// A single unnormalized record as returned by a platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    body: Value,
}

impl RawPayload {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Look up a string by JSON pointer (`/snippet/title`).
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body.pointer(pointer).and_then(Value::as_str)
    }

    /// Look up a value by JSON pointer, skipping nulls.
    pub fn value_at(&self, pointer: &str) -> Option<&Value> {
        self.body.pointer(pointer).filter(|v| !v.is_null())
    }

    /// Numeric lookup that also accepts numbers encoded as strings, as the
    /// YouTube statistics object does.
    pub fn i64_at(&self, pointer: &str) -> Option<i64> {
        match self.value_at(pointer)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Short label for failure reports: the first identifier-like field present.
    pub fn reference(&self, position: usize) -> String {
        ["/id", "/guid", "/sha", "/name", "/link"]
            .iter()
            .find_map(|p| match self.body.pointer(p)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| format!("payload #{position}"))
    }
}

impl From<Value> for RawPayload {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

/// Upper bound on raw payloads consumed by one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxResults {
    Limit(NonZeroUsize),
    #[default]
    Unbounded,
}

impl MaxResults {
    pub const fn limit(n: NonZeroUsize) -> Self {
        Self::Limit(n)
    }

    /// How many more payloads may be consumed after `consumed`.
    pub fn remaining(&self, consumed: usize) -> Option<usize> {
        match self {
            Self::Limit(n) => Some(n.get().saturating_sub(consumed)),
            Self::Unbounded => None,
        }
    }

    pub fn allows(&self, consumed: usize) -> bool {
        self.remaining(consumed).is_none_or(|r| r > 0)
    }
}

impl From<Option<NonZeroUsize>> for MaxResults {
    fn from(value: Option<NonZeroUsize>) -> Self {
        value.map_or(Self::Unbounded, Self::Limit)
    }
}

impl std::fmt::Display for MaxResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit(n) => write!(f, "{n}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Which platform-specific fields to keep on each item.
///
/// `title`, `content` and `published_at` are always populated; the projection
/// only narrows `raw_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldProjection {
    #[default]
    All,
    Only(HashSet<String>),
}

impl FieldProjection {
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(fields.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-separated list; empty input or `all` means everything.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        Self::only(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(field),
        }
    }

    /// Start collecting raw fields under this projection.
    pub fn collector(&self) -> FieldCollector<'_> {
        FieldCollector {
            projection: self,
            fields: Map::new(),
        }
    }
}

/// Builds `raw_fields`, skipping fields outside the projection before their
/// values are computed.
#[derive(Debug)]
pub struct FieldCollector<'a> {
    projection: &'a FieldProjection,
    fields: Map<String, Value>,
}

impl FieldCollector<'_> {
    /// Insert `name` if projected and the producer yields a value.
    pub fn put<V, F>(&mut self, name: &str, produce: F) -> &mut Self
    where
        V: Into<Value>,
        F: FnOnce() -> Option<V>,
    {
        if self.projection.includes(name)
            && let Some(value) = produce()
        {
            self.fields.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn finish(self) -> Map<String, Value> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn max_results_remaining() {
        let limit = MaxResults::limit(NonZeroUsize::new(10).unwrap());
        assert_eq!(limit.remaining(0), Some(10));
        assert_eq!(limit.remaining(12), Some(0));
        assert!(limit.allows(9));
        assert!(!limit.allows(10));
        assert!(MaxResults::Unbounded.allows(usize::MAX));
        assert_eq!(limit.to_string(), "10");
    }

    #[test]
    fn projection_parse() {
        assert_eq!(FieldProjection::parse(""), FieldProjection::All);
        assert_eq!(FieldProjection::parse("ALL"), FieldProjection::All);
        let only = FieldProjection::parse("url, author,,");
        assert!(only.includes("url"));
        assert!(only.includes("author"));
        assert!(!only.includes("score"));
    }

    #[test]
    fn collector_skips_unprojected_fields_without_computing() {
        let projection = FieldProjection::only(["url"]);
        let mut collector = projection.collector();
        collector
            .put("url", || Some("https://example.com"))
            .put::<i64, _>("score", || panic!("score is not projected"));
        let fields = collector.finish();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["url"], json!("https://example.com"));
    }

    #[test]
    fn collector_omits_missing_values() {
        let projection = FieldProjection::All;
        let mut collector = projection.collector();
        collector.put::<String, _>("author", || None);
        assert!(collector.finish().is_empty());
    }

    #[test]
    fn payload_lookups() {
        let payload = RawPayload::new(json!({
            "id": "abc",
            "statistics": {"viewCount": "1200"},
            "score": 7,
            "note": null,
        }));
        assert_eq!(payload.i64_at("/statistics/viewCount"), Some(1200));
        assert_eq!(payload.i64_at("/score"), Some(7));
        assert!(payload.value_at("/note").is_none());
        assert_eq!(payload.reference(3), "abc");
        assert_eq!(RawPayload::new(json!({})).reference(3), "payload #3");
    }
}
