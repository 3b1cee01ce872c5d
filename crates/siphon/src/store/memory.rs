//! In-memory [`ItemStore`] for coordinator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DbErr;
use serde_json::Value;
use uuid::Uuid;

use crate::entity::item::Model as ItemModel;
use crate::entity::source::Model as SourceModel;

use super::errors::{Result, StoreError};
use super::item_store::ItemStore;
use super::items::{ItemFilter, ItemPage, ItemRecord, Pagination, UpsertBatch, UpsertOutcome};
use super::sources::SourceStateUpdate;

#[derive(Default)]
struct State {
    sources: HashMap<Uuid, SourceModel>,
    items: Vec<ItemModel>,
}

#[derive(Default)]
pub(crate) struct MemoryItemStore {
    state: Mutex<State>,
    fail_commits: AtomicUsize,
    commits: AtomicUsize,
}

impl MemoryItemStore {
    pub fn with_source(source: SourceModel) -> Self {
        let store = Self::default();
        store.put_source(source);
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put_source(&self, source: SourceModel) {
        self.lock().sources.insert(source.id, source);
    }

    pub fn source(&self, source_id: Uuid) -> Option<SourceModel> {
        self.lock().sources.get(&source_id).cloned()
    }

    pub fn items(&self, source_id: Uuid) -> Vec<ItemModel> {
        self.lock()
            .items
            .iter()
            .filter(|item| item.source_id == source_id)
            .cloned()
            .collect()
    }

    /// Make the next `n` commits fail without writing anything.
    pub fn fail_next_commits(&self, n: usize) {
        self.fail_commits.store(n, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn apply_batch(state: &mut State, batch: &UpsertBatch) -> Result<UpsertOutcome> {
        let now = Utc::now().fixed_offset();
        let mut outcome = UpsertOutcome::default();

        for record in &batch.inserts {
            let existing = state.items.iter_mut().find(|item| {
                item.source_id == batch.source_id
                    && item.external_identifier == record.external_identifier
            });
            match existing {
                Some(item) => {
                    overwrite(item, record);
                    item.updated_at = now;
                }
                None => {
                    let id = Uuid::new_v4();
                    state.items.push(ItemModel {
                        id,
                        source_id: batch.source_id,
                        external_identifier: record.external_identifier.clone(),
                        title: record.title.clone(),
                        content: record.content.clone(),
                        published_at: record.published_at.map(|ts| ts.fixed_offset()),
                        fields: Value::Object(record.fields.clone()),
                        active: true,
                        first_seen_at: now,
                        updated_at: now,
                    });
                    outcome.inserted_ids.push(id);
                }
            }
        }

        for update in &batch.updates {
            let item = state
                .items
                .iter_mut()
                .find(|item| item.id == update.id && item.source_id == batch.source_id)
                .ok_or_else(|| StoreError::not_found_by_id("item", update.id))?;
            overwrite(item, &update.record);
            item.updated_at = now;
            outcome.updated_ids.push(update.id);
        }

        Ok(outcome)
    }

    fn apply_state(
        state: &mut State,
        source_id: Uuid,
        update: &SourceStateUpdate,
    ) -> Result<SourceModel> {
        let source = state
            .sources
            .get_mut(&source_id)
            .ok_or_else(|| StoreError::not_found_by_id("source", source_id))?;
        source.metadata = update.apply_to(&source.metadata);
        if let Some(cursor) = &update.cursor {
            source.last_synced_cursor = Some(cursor.clone());
        }
        source.last_synced_at = Some(update.synced_at.fixed_offset());
        Ok(source.clone())
    }
}

fn overwrite(item: &mut ItemModel, record: &ItemRecord) {
    item.title = record.title.clone();
    item.content = record.content.clone();
    item.published_at = record.published_at.map(|ts| ts.fixed_offset());
    item.fields = Value::Object(record.fields.clone());
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn load_source(&self, source_id: Uuid) -> Result<Option<SourceModel>> {
        Ok(self.source(source_id))
    }

    async fn exists_by_identifier(
        &self,
        source_id: Uuid,
        external_identifier: &str,
    ) -> Result<bool> {
        Ok(self.lock().items.iter().any(|item| {
            item.source_id == source_id && item.external_identifier == external_identifier
        }))
    }

    async fn find_by_identifiers(
        &self,
        source_id: Uuid,
        identifiers: &[String],
    ) -> Result<HashMap<String, ItemModel>> {
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|item| {
                item.source_id == source_id && identifiers.contains(&item.external_identifier)
            })
            .map(|item| (item.external_identifier.clone(), item.clone()))
            .collect())
    }

    async fn upsert_batch(&self, batch: &UpsertBatch) -> Result<UpsertOutcome> {
        Self::apply_batch(&mut self.lock(), batch)
    }

    async fn update_source_state(
        &self,
        source_id: Uuid,
        update: &SourceStateUpdate,
    ) -> Result<SourceModel> {
        Self::apply_state(&mut self.lock(), source_id, update)
    }

    async fn commit_sync(
        &self,
        batch: &UpsertBatch,
        update: &SourceStateUpdate,
    ) -> Result<UpsertOutcome> {
        let injected = self
            .fail_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Database(DbErr::Custom(
                "injected batch failure".to_string(),
            )));
        }

        let mut guard = self.lock();
        // Stage on a copy so a failure leaves nothing behind.
        let mut staged = State {
            sources: guard.sources.clone(),
            items: guard.items.clone(),
        };
        let outcome = Self::apply_batch(&mut staged, batch)?;
        Self::apply_state(&mut staged, batch.source_id, update)?;
        *guard = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn list_filtered(&self, filter: &ItemFilter, pagination: Pagination) -> Result<ItemPage> {
        let mut matching: Vec<ItemModel> = self
            .lock()
            .items
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.first_seen_at.cmp(&a.first_seen_at))
                .then_with(|| a.external_identifier.cmp(&b.external_identifier))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(ItemPage {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        })
    }

    async fn set_active(
        &self,
        source_id: Uuid,
        identifiers: &[String],
        active: bool,
    ) -> Result<Vec<String>> {
        let mut state = self.lock();
        let mut matched = Vec::new();
        for identifier in identifiers {
            if let Some(item) = state.items.iter_mut().find(|item| {
                item.source_id == source_id && &item.external_identifier == identifier
            }) {
                item.active = active;
                matched.push(identifier.clone());
            }
        }
        Ok(matched)
    }
}
