use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::entity::item::{ActiveModel, Column, Entity as Item, Model};
use crate::model::CanonicalItem;

use super::errors::{Result, StoreError};

/// Default page size for [`list_filtered`].
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// Rows per `INSERT` statement; keeps bind parameters well under SQLite's cap.
const INSERT_CHUNK: usize = 200;

/// Identifiers per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

/// Column values written for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub external_identifier: String,
    pub title: String,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fields: Map<String, Value>,
}

impl From<CanonicalItem> for ItemRecord {
    fn from(item: CanonicalItem) -> Self {
        Self {
            external_identifier: item.external_identifier,
            title: item.title,
            content: item.content,
            published_at: item.published_at,
            fields: item.raw_fields,
        }
    }
}

impl ItemRecord {
    fn into_active_model(
        self,
        id: Uuid,
        source_id: Uuid,
        now: DateTime<FixedOffset>,
    ) -> ActiveModel {
        ActiveModel {
            id: Set(id),
            source_id: Set(source_id),
            external_identifier: Set(self.external_identifier),
            title: Set(self.title),
            content: Set(self.content),
            published_at: Set(self.published_at.map(|ts| ts.fixed_offset())),
            fields: Set(Value::Object(self.fields)),
            active: Set(true),
            first_seen_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// A changed record for an existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub id: Uuid,
    pub record: ItemRecord,
}

/// Staged writes for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertBatch {
    pub source_id: Uuid,
    pub inserts: Vec<ItemRecord>,
    pub updates: Vec<ItemUpdate>,
}

impl UpsertBatch {
    pub fn new(source_id: Uuid) -> Self {
        Self {
            source_id,
            inserts: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }
}

/// Ids written by [`upsert_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted_ids: Vec<Uuid>,
    pub updated_ids: Vec<Uuid>,
}

/// Predicates for [`list_filtered`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub source_id: Option<Uuid>,
    pub active: Option<bool>,
    /// Items published at or after this instant; undated items never match.
    pub published_since: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the title.
    pub title_contains: Option<String>,
}

impl ItemFilter {
    #[must_use]
    pub fn source(mut self, source_id: Uuid) -> Self {
        self.source_id = Some(source_id);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn published_since(mut self, since: DateTime<Utc>) -> Self {
        self.published_since = Some(since);
        self
    }

    #[must_use]
    pub fn title_contains(mut self, needle: impl Into<String>) -> Self {
        self.title_contains = Some(needle.into());
        self
    }

    /// In-memory evaluation of the same predicates.
    pub fn matches(&self, item: &Model) -> bool {
        self.source_id.is_none_or(|id| item.source_id == id)
            && self.active.is_none_or(|active| item.active == active)
            && self.published_since.is_none_or(|since| {
                item.published_at
                    .is_some_and(|ts| ts.with_timezone(&Utc) >= since)
            })
            && self.title_contains.as_deref().is_none_or(|needle| {
                item.title
                    .to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase())
            })
    }

    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(source_id) = self.source_id {
            condition = condition.add(Column::SourceId.eq(source_id));
        }
        if let Some(active) = self.active {
            condition = condition.add(Column::Active.eq(active));
        }
        if let Some(since) = self.published_since {
            condition = condition.add(Column::PublishedAt.gte(since.fixed_offset()));
        }
        if let Some(needle) = self.title_contains.as_deref().filter(|n| !n.is_empty()) {
            condition = condition.add(Column::Title.like(super::contains_pattern(needle)));
        }
        condition
    }
}

/// Limit/offset window for [`list_filtered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

impl Pagination {
    /// A zero limit is raised to one.
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.max(1),
            offset,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// One window of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPage {
    pub items: Vec<Model>,
    /// Matches across all windows.
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl ItemPage {
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

pub async fn exists_by_identifier<C: ConnectionTrait>(
    db: &C,
    source_id: Uuid,
    external_identifier: &str,
) -> Result<bool> {
    let count = Item::find()
        .filter(Column::SourceId.eq(source_id))
        .filter(Column::ExternalIdentifier.eq(external_identifier))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Stored items of `source_id` among `identifiers`, keyed by identifier.
pub async fn find_by_identifiers<C: ConnectionTrait>(
    db: &C,
    source_id: Uuid,
    identifiers: &[String],
) -> Result<HashMap<String, Model>> {
    let mut found = HashMap::with_capacity(identifiers.len());

    for chunk in identifiers.chunks(LOOKUP_CHUNK) {
        let rows = Item::find()
            .filter(Column::SourceId.eq(source_id))
            .filter(Column::ExternalIdentifier.is_in(chunk.iter().cloned()))
            .all(db)
            .await?;
        found.extend(
            rows.into_iter()
                .map(|row| (row.external_identifier.clone(), row)),
        );
    }

    Ok(found)
}

/// Filtered listing, newest published first.
pub async fn list_filtered<C: ConnectionTrait>(
    db: &C,
    filter: &ItemFilter,
    pagination: Pagination,
) -> Result<ItemPage> {
    let query = Item::find().filter(filter.condition());
    let total = query.clone().count(db).await?;
    let items = query
        .order_by_desc(Column::PublishedAt)
        .order_by_desc(Column::FirstSeenAt)
        .order_by_asc(Column::ExternalIdentifier)
        .offset(pagination.offset)
        .limit(pagination.limit)
        .all(db)
        .await?;

    Ok(ItemPage {
        items,
        total,
        limit: pagination.limit,
        offset: pagination.offset,
    })
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Build the ON CONFLICT clause used for batch inserts.
///
/// Conflict detection uses `(source_id, external_identifier)`. A row that
/// appeared since staging gets the new content; `active` and `first_seen_at`
/// are never overwritten.
pub(crate) fn build_item_on_conflict() -> OnConflict {
    OnConflict::columns([Column::SourceId, Column::ExternalIdentifier])
        .update_columns([
            Column::Title,
            Column::Content,
            Column::PublishedAt,
            Column::Fields,
            Column::UpdatedAt,
        ])
        .to_owned()
}

/// Write a staged batch.
///
/// Callers wanting all-or-nothing semantics run this inside a transaction
/// (see [`ItemStore::commit_sync`](super::ItemStore::commit_sync)).
pub async fn upsert_batch<C: ConnectionTrait>(
    db: &C,
    batch: &UpsertBatch,
) -> Result<UpsertOutcome> {
    let now = Utc::now().fixed_offset();
    let mut outcome = UpsertOutcome::default();

    for chunk in batch.inserts.chunks(INSERT_CHUNK) {
        let mut staged: HashMap<String, Uuid> = HashMap::with_capacity(chunk.len());
        let models: Vec<ActiveModel> = chunk
            .iter()
            .cloned()
            .map(|record| {
                let id = Uuid::new_v4();
                staged.entry(record.external_identifier.clone()).or_insert(id);
                record.into_active_model(id, batch.source_id, now)
            })
            .collect();

        Item::insert_many(models)
            .on_conflict(build_item_on_conflict())
            .exec_without_returning(db)
            .await?;

        // Rows written since staging took the conflict path and keep their id.
        let identifiers: Vec<String> = staged.keys().cloned().collect();
        let stored = find_by_identifiers(db, batch.source_id, &identifiers).await?;
        for record in chunk {
            let identifier = &record.external_identifier;
            let Some(staged_id) = staged.remove(identifier) else {
                continue;
            };
            let row = stored.get(identifier).ok_or_else(|| StoreError::NotFound {
                context: format!(
                    "item ({identifier}) in source {} after insert",
                    batch.source_id
                ),
            })?;
            if row.id == staged_id {
                outcome.inserted_ids.push(row.id);
            } else {
                outcome.updated_ids.push(row.id);
            }
        }
    }

    for update in &batch.updates {
        let record = &update.record;
        let result = Item::update_many()
            .col_expr(Column::Title, Expr::value(record.title.clone()))
            .col_expr(Column::Content, Expr::value(record.content.clone()))
            .col_expr(
                Column::PublishedAt,
                Expr::value(record.published_at.map(|ts| ts.fixed_offset())),
            )
            .col_expr(Column::Fields, Expr::value(Value::Object(record.fields.clone())))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(update.id))
            .filter(Column::SourceId.eq(batch.source_id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound {
                context: format!(
                    "item id={} ({}) in source {}",
                    update.id, record.external_identifier, batch.source_id
                ),
            });
        }
        outcome.updated_ids.push(update.id);
    }

    tracing::debug!(
        source_id = %batch.source_id,
        inserted = outcome.inserted_ids.len(),
        updated = outcome.updated_ids.len(),
        "Wrote item batch"
    );
    Ok(outcome)
}

/// Set `active` on the items of `source_id` named in `identifiers`.
///
/// Returns the identifiers that matched a stored item, in input order.
pub async fn set_active<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    source_id: Uuid,
    identifiers: &[String],
    active: bool,
) -> Result<Vec<String>> {
    if identifiers.is_empty() {
        return Ok(Vec::new());
    }

    let txn = db.begin().await?;
    let existing = find_by_identifiers(&txn, source_id, identifiers).await?;
    let matched: Vec<String> = identifiers
        .iter()
        .filter(|id| existing.contains_key(id.as_str()))
        .cloned()
        .collect();

    let now = Utc::now().fixed_offset();
    for chunk in matched.chunks(LOOKUP_CHUNK) {
        Item::update_many()
            .col_expr(Column::Active, Expr::value(active))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::SourceId.eq(source_id))
            .filter(Column::ExternalIdentifier.is_in(chunk.iter().cloned()))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, QueryTrait};
    use serde_json::json;

    use super::*;

    fn model(identifier: &str, title: &str, published: Option<DateTime<Utc>>) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            source_id: Uuid::nil(),
            external_identifier: identifier.to_string(),
            title: title.to_string(),
            content: None,
            published_at: published.map(|ts| ts.fixed_offset()),
            fields: json!({}),
            active: true,
            first_seen_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_on_conflict_targets_dedup_key() {
        let record = ItemRecord {
            external_identifier: "g1".to_string(),
            title: "Hello".to_string(),
            content: None,
            published_at: None,
            fields: Map::new(),
        };
        let sql = Item::insert_many(vec![
            record.into_active_model(Uuid::new_v4(), Uuid::new_v4(), Utc::now().fixed_offset()),
        ])
        .on_conflict(build_item_on_conflict())
        .build(DatabaseBackend::Sqlite)
        .to_string();

        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(
            sql.contains("(\"source_id\", \"external_identifier\")"),
            "{sql}"
        );
        assert!(sql.contains("DO UPDATE"), "{sql}");
        assert!(!sql.contains("\"active\" = \"excluded\""), "{sql}");
    }

    #[test]
    fn filter_matches_in_memory() {
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let filter = ItemFilter::default()
            .published_since(since)
            .title_contains("RUST");

        assert!(filter.matches(&model("a", "Rust 1.85 released", Some(since))));
        assert!(!filter.matches(&model("b", "Rust 1.84", Some(since - chrono::Duration::days(1)))));
        assert!(!filter.matches(&model("c", "Rust undated", None)));
        assert!(!filter.matches(&model("d", "Go news", Some(since))));

        let literal = ItemFilter::default().title_contains("50%");
        assert!(literal.matches(&model("f", "Save 50% today", None)));
        assert!(!literal.matches(&model("g", "500 tips", None)));
        // Case folding is ASCII-only, as in SQLite's LIKE.
        let umlaut = ItemFilter::default().title_contains("ärger");
        assert!(!umlaut.matches(&model("h", "ÄRGER", None)));

        let mut inactive = model("e", "x", None);
        inactive.active = false;
        assert!(!ItemFilter::default().active(true).matches(&inactive));
        assert!(ItemFilter::default().matches(&inactive));
    }

    #[test]
    fn pagination_defaults_and_has_more() {
        assert_eq!(Pagination::default().limit, DEFAULT_LIST_LIMIT);
        assert_eq!(Pagination::new(0, 5).limit, 1);

        let page = ItemPage {
            items: vec![model("a", "a", None)],
            total: 3,
            limit: 1,
            offset: 1,
        };
        assert!(page.has_more());
    }
}
