//! Manual curation of items: bulk activate and deactivate.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::store::{ItemStore, Result, StoreError};

/// Result of a bulk (de)activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub source_id: Uuid,
    /// The flag that was set.
    pub active: bool,
    /// Identifiers that named a stored item.
    pub matched: Vec<String>,
    /// Identifiers with no stored item; reported, not an error.
    pub unmatched: Vec<String>,
}

impl ActivationReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Mark the named items of `source_id` active.
pub async fn activate(
    store: &dyn ItemStore,
    source_id: Uuid,
    identifiers: &[String],
) -> Result<ActivationReport> {
    set_active(store, source_id, identifiers, true).await
}

/// Mark the named items of `source_id` inactive.
pub async fn deactivate(
    store: &dyn ItemStore,
    source_id: Uuid,
    identifiers: &[String],
) -> Result<ActivationReport> {
    set_active(store, source_id, identifiers, false).await
}

#[tracing::instrument(skip(store, identifiers), fields(requested = identifiers.len()))]
async fn set_active(
    store: &dyn ItemStore,
    source_id: Uuid,
    identifiers: &[String],
    active: bool,
) -> Result<ActivationReport> {
    if store.load_source(source_id).await?.is_none() {
        return Err(StoreError::not_found_by_id("source", source_id));
    }

    let requested = dedup(identifiers);
    let matched = store.set_active(source_id, &requested, active).await?;
    let found: HashSet<&str> = matched.iter().map(String::as_str).collect();
    let unmatched: Vec<String> = requested
        .iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect();

    if !unmatched.is_empty() {
        tracing::warn!(
            unmatched = unmatched.len(),
            identifiers = %unmatched.join(","),
            "Some identifiers matched no item"
        );
    }
    tracing::info!(matched = matched.len(), "Updated item activation");

    Ok(ActivationReport {
        source_id,
        active,
        matched,
        unmatched,
    })
}

/// Trimmed, non-empty identifiers in first-seen order.
fn dedup(identifiers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::adapter::test_support::source_model;
    use crate::entity::platform::Platform;
    use crate::store::memory::MemoryItemStore;
    use crate::store::{ItemRecord, SourceStateUpdate, UpsertBatch};

    async fn seeded() -> (MemoryItemStore, Uuid) {
        let source = source_model(Platform::Rss);
        let source_id = source.id;
        let store = MemoryItemStore::with_source(source);
        let mut batch = UpsertBatch::new(source_id);
        for id in ["a", "b", "c"] {
            batch.inserts.push(ItemRecord {
                external_identifier: id.to_string(),
                title: id.to_uppercase(),
                content: None,
                published_at: None,
                fields: Default::default(),
            });
        }
        store
            .commit_sync(&batch, &SourceStateUpdate::new(Utc::now()))
            .await
            .unwrap();
        (store, source_id)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_match_reports_unmatched() {
        let (store, source_id) = seeded().await;
        deactivate(&store, source_id, &ids(&["a", "b"])).await.unwrap();

        let report = activate(&store, source_id, &ids(&["a", "b", "missing"]))
            .await
            .expect("partial match is not an error");

        assert_eq!(report.matched, ids(&["a", "b"]));
        assert_eq!(report.unmatched, ids(&["missing"]));
        assert!(!report.is_complete());
        assert!(store.items(source_id).iter().all(|item| item.active));
    }

    #[tokio::test]
    async fn deactivate_touches_only_named_items() {
        let (store, source_id) = seeded().await;
        let report = deactivate(&store, source_id, &ids(&["b", " b ", ""]))
            .await
            .unwrap();
        assert_eq!(report.matched, ids(&["b"]));
        assert!(report.is_complete());

        let inactive: Vec<_> = store
            .items(source_id)
            .into_iter()
            .filter(|item| !item.active)
            .map(|item| item.external_identifier)
            .collect();
        assert_eq!(inactive, ids(&["b"]));
    }

    #[tokio::test]
    async fn unknown_source_is_not_found() {
        let (store, _) = seeded().await;
        let err = activate(&store, Uuid::new_v4(), &ids(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
