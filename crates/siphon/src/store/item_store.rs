use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use uuid::Uuid;

use crate::entity::item::Model as ItemModel;
use crate::entity::source::Model as SourceModel;
use crate::retry::{RetryConfig, with_retry};

use super::errors::{Result, StoreError};
use super::items::{self, ItemFilter, ItemPage, Pagination, UpsertBatch, UpsertOutcome};
use super::sources::{self, SourceStateUpdate};

/// Default number of retry attempts for a sync commit.
const DEFAULT_COMMIT_RETRIES: usize = 3;

/// Initial backoff between commit attempts.
const COMMIT_RETRY_MIN_DELAY_MS: u64 = 100;

/// Upper bound on backoff between commit attempts.
const COMMIT_RETRY_MAX_DELAY_MS: u64 = 2_000;

/// Item persistence as seen by the sync coordinator.
///
/// Implementations must make [`ItemStore::commit_sync`] all-or-nothing: either
/// every staged row and the source state are written, or none are.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load_source(&self, source_id: Uuid) -> Result<Option<SourceModel>>;

    async fn exists_by_identifier(
        &self,
        source_id: Uuid,
        external_identifier: &str,
    ) -> Result<bool>;

    /// Stored items of `source_id` among `identifiers`, keyed by identifier.
    async fn find_by_identifiers(
        &self,
        source_id: Uuid,
        identifiers: &[String],
    ) -> Result<HashMap<String, ItemModel>>;

    /// Write a batch outside of a sync commit.
    async fn upsert_batch(&self, batch: &UpsertBatch) -> Result<UpsertOutcome>;

    async fn update_source_state(
        &self,
        source_id: Uuid,
        update: &SourceStateUpdate,
    ) -> Result<SourceModel>;

    /// Write `batch` and `update` as one unit.
    async fn commit_sync(
        &self,
        batch: &UpsertBatch,
        update: &SourceStateUpdate,
    ) -> Result<UpsertOutcome>;

    async fn list_filtered(&self, filter: &ItemFilter, pagination: Pagination) -> Result<ItemPage>;

    /// Set `active` on matching items; returns the identifiers that matched.
    async fn set_active(
        &self,
        source_id: Uuid,
        identifiers: &[String],
        active: bool,
    ) -> Result<Vec<String>>;
}

/// [`ItemStore`] over a shared SeaORM connection.
#[derive(Debug, Clone)]
pub struct SeaOrmItemStore {
    db: Arc<DatabaseConnection>,
    commit_retry: RetryConfig,
}

impl SeaOrmItemStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            commit_retry: RetryConfig::new(
                Duration::from_millis(COMMIT_RETRY_MIN_DELAY_MS),
                Duration::from_millis(COMMIT_RETRY_MAX_DELAY_MS),
                DEFAULT_COMMIT_RETRIES,
            ),
        }
    }

    /// Override the retry policy for transient commit failures.
    #[must_use]
    pub fn with_commit_retry(mut self, retry: RetryConfig) -> Self {
        self.commit_retry = retry;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    async fn commit_once(
        &self,
        batch: &UpsertBatch,
        update: &SourceStateUpdate,
    ) -> Result<UpsertOutcome> {
        let txn = self.db.begin().await?;
        let outcome = items::upsert_batch(&txn, batch).await?;
        sources::update_state(&txn, batch.source_id, update).await?;
        txn.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl ItemStore for SeaOrmItemStore {
    async fn load_source(&self, source_id: Uuid) -> Result<Option<SourceModel>> {
        sources::find_by_id(self.connection(), source_id).await
    }

    async fn exists_by_identifier(
        &self,
        source_id: Uuid,
        external_identifier: &str,
    ) -> Result<bool> {
        items::exists_by_identifier(self.connection(), source_id, external_identifier).await
    }

    async fn find_by_identifiers(
        &self,
        source_id: Uuid,
        identifiers: &[String],
    ) -> Result<HashMap<String, ItemModel>> {
        items::find_by_identifiers(self.connection(), source_id, identifiers).await
    }

    async fn upsert_batch(&self, batch: &UpsertBatch) -> Result<UpsertOutcome> {
        if batch.is_empty() {
            return Ok(UpsertOutcome::default());
        }
        let txn = self.db.begin().await?;
        let outcome = items::upsert_batch(&txn, batch).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn update_source_state(
        &self,
        source_id: Uuid,
        update: &SourceStateUpdate,
    ) -> Result<SourceModel> {
        sources::update_state(self.connection(), source_id, update).await
    }

    async fn commit_sync(
        &self,
        batch: &UpsertBatch,
        update: &SourceStateUpdate,
    ) -> Result<UpsertOutcome> {
        let context = format!("commit_sync source={}", batch.source_id);
        with_retry(
            || self.commit_once(batch, update),
            &self.commit_retry,
            StoreError::is_transient,
            &context,
        )
        .await
    }

    async fn list_filtered(&self, filter: &ItemFilter, pagination: Pagination) -> Result<ItemPage> {
        items::list_filtered(self.connection(), filter, pagination).await
    }

    async fn set_active(
        &self,
        source_id: Uuid,
        identifiers: &[String],
        active: bool,
    ) -> Result<Vec<String>> {
        items::set_active(self.connection(), source_id, identifiers, active).await
    }
}
