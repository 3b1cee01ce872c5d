use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::adapter::{AdapterRegistry, ResolvedSource};
use crate::entity::platform::Platform;
use crate::entity::source::{ActiveModel, Column, Entity as Source, Model};
use crate::entity::source_type::SourceType;
use crate::value::{ConfigMap, ConfigValue};

use super::entities;
use super::errors::{Result, StoreError};

/// Input for [`create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub entity_id: Uuid,
    pub platform: Platform,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub url: String,
    pub name: String,
    pub config: ConfigMap,
}

impl NewSource {
    /// A source for `entity_id` built from a resolved URL.
    pub fn from_resolved(entity_id: Uuid, resolved: ResolvedSource) -> Self {
        Self {
            entity_id,
            platform: resolved.platform,
            source_type: resolved.source_type,
            source_identifier: resolved.source_identifier,
            url: resolved.url,
            name: resolved.name,
            config: resolved.config,
        }
    }
}

/// Caller-supplied values layered over what URL resolution produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOverrides {
    pub name: Option<String>,
    /// Merged into the resolver's config; keys here win.
    pub config: ConfigMap,
}

/// Predicates for [`list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub entity_id: Option<Uuid>,
    pub platform: Option<Platform>,
    pub source_type: Option<SourceType>,
    pub active: Option<bool>,
    pub name_contains: Option<String>,
}

/// Post-sync changes to a source row.
///
/// Applied by the sync coordinator only, together with the item batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStateUpdate {
    /// New cursor; `None` keeps the stored one.
    pub cursor: Option<String>,
    /// Metadata keys to set.
    pub set: ConfigMap,
    /// Metadata keys to delete.
    pub remove: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

impl SourceStateUpdate {
    pub fn new(synced_at: DateTime<Utc>) -> Self {
        Self {
            cursor: None,
            set: ConfigMap::new(),
            remove: Vec::new(),
            synced_at,
        }
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set.insert(key, value);
        self
    }

    #[must_use]
    pub fn remove(mut self, key: &str) -> Self {
        self.remove.push(key.to_string());
        self
    }

    /// Metadata after applying this update to `current`.
    pub fn apply_to(&self, current: &ConfigMap) -> ConfigMap {
        let mut metadata = current.clone();
        metadata.merge(self.set.clone());
        for key in &self.remove {
            metadata.remove(key);
        }
        metadata
    }
}

// ─── Single Record Operations ────────────────────────────────────────────────

/// Create a source.
///
/// # Errors
/// - `StoreError::InvalidInput` if the platform does not offer the source type
///   or the identifier is blank.
/// - `StoreError::NotFound` if the entity does not exist.
/// - `StoreError::Duplicate` if the entity already has this platform identifier.
pub async fn create(db: &DatabaseConnection, new: NewSource) -> Result<Model> {
    if !new.platform.supports(new.source_type) {
        return Err(StoreError::invalid_input(format!(
            "{} does not support {} sources",
            new.platform, new.source_type
        )));
    }
    let identifier = new.source_identifier.trim();
    if identifier.is_empty() {
        return Err(StoreError::invalid_input(
            "source identifier must not be empty",
        ));
    }

    entities::get(db, new.entity_id).await?;
    if find_by_natural_key(db, new.entity_id, new.platform, identifier)
        .await?
        .is_some()
    {
        return Err(StoreError::Duplicate {
            context: format!("{}/{} for entity {}", new.platform, identifier, new.entity_id),
        });
    }

    let now = Utc::now().fixed_offset();
    let name = if new.name.trim().is_empty() {
        identifier.to_string()
    } else {
        new.name.trim().to_string()
    };
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        entity_id: Set(new.entity_id),
        platform: Set(new.platform),
        source_type: Set(new.source_type),
        source_identifier: Set(identifier.to_string()),
        url: Set(new.url),
        name: Set(name),
        config: Set(new.config),
        metadata: Set(ConfigMap::new()),
        last_synced_cursor: Set(None),
        last_synced_at: Set(None),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = model.insert(db).await?;
    tracing::info!(
        source_id = %created.id,
        platform = %created.platform,
        identifier = %created.source_identifier,
        "Created source"
    );
    Ok(created)
}

/// Resolve `url` through the registry and create the resulting source.
pub async fn create_from_url(
    db: &DatabaseConnection,
    registry: &AdapterRegistry,
    entity_id: Uuid,
    url: &str,
    overrides: SourceOverrides,
) -> Result<Model> {
    let resolved = registry.resolve(url)?;
    let mut new = NewSource::from_resolved(entity_id, resolved);
    if let Some(name) = overrides.name {
        new.name = name;
    }
    new.config.merge(overrides.config);
    create(db, new).await
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Model>> {
    Source::find_by_id(id)
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// Like [`find_by_id`], but a miss is `StoreError::NotFound`.
pub async fn get<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Model> {
    find_by_id(db, id)
        .await?
        .ok_or_else(|| StoreError::not_found_by_id("source", id))
}

/// Find a source by its natural key (entity + platform + identifier).
pub async fn find_by_natural_key(
    db: &DatabaseConnection,
    entity_id: Uuid,
    platform: Platform,
    source_identifier: &str,
) -> Result<Option<Model>> {
    Source::find()
        .filter(Column::EntityId.eq(entity_id))
        .filter(Column::Platform.eq(platform))
        .filter(Column::SourceIdentifier.eq(source_identifier))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// Write a sync run's cursor and metadata patch.
pub async fn update_state<C: ConnectionTrait>(
    db: &C,
    source_id: Uuid,
    update: &SourceStateUpdate,
) -> Result<Model> {
    let existing = get(db, source_id).await?;
    let metadata = update.apply_to(&existing.metadata);
    let cursor = update
        .cursor
        .clone()
        .or_else(|| existing.last_synced_cursor.clone());

    let mut model: ActiveModel = existing.into();
    model.metadata = Set(metadata);
    model.last_synced_cursor = Set(cursor);
    model.last_synced_at = Set(Some(update.synced_at.fixed_offset()));
    model.updated_at = Set(Utc::now().fixed_offset());

    model.update(db).await.map_err(StoreError::from)
}

// ─── Query Operations ────────────────────────────────────────────────────────

/// List sources ordered by name.
pub async fn list(db: &DatabaseConnection, filter: &SourceFilter) -> Result<Vec<Model>> {
    let mut condition = Condition::all();
    if let Some(entity_id) = filter.entity_id {
        condition = condition.add(Column::EntityId.eq(entity_id));
    }
    if let Some(platform) = filter.platform {
        condition = condition.add(Column::Platform.eq(platform));
    }
    if let Some(source_type) = filter.source_type {
        condition = condition.add(Column::SourceType.eq(source_type));
    }
    if let Some(active) = filter.active {
        condition = condition.add(Column::Active.eq(active));
    }
    if let Some(needle) = filter.name_contains.as_deref().filter(|n| !n.is_empty()) {
        condition = condition.add(Column::Name.like(super::contains_pattern(needle)));
    }

    Source::find()
        .filter(condition)
        .order_by_asc(Column::Name)
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Bulk (de)activate sources. Returns the number of rows changed.
pub async fn set_active(db: &DatabaseConnection, ids: &[Uuid], active: bool) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = Source::update_many()
        .col_expr(Column::Active, active.into())
        .col_expr(Column::UpdatedAt, Utc::now().fixed_offset().into())
        .filter(Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_update_sets_and_removes_metadata() {
        let mut current = ConfigMap::new();
        current.insert("items_processed", 10);
        current.insert("last_error", "boom");

        let update = SourceStateUpdate::new(Utc::now())
            .set("items_processed", 15)
            .set("last_inserted", 5)
            .remove("last_error");
        let metadata = update.apply_to(&current);

        assert_eq!(metadata.get_i64("items_processed"), Some(15));
        assert_eq!(metadata.get_i64("last_inserted"), Some(5));
        assert!(!metadata.contains_key("last_error"));
    }

    #[test]
    fn new_source_from_resolved_keeps_config() {
        let resolved = ResolvedSource::new(
            Platform::GitHub,
            SourceType::Repo,
            "o/r",
            "https://github.com/o/r",
        )
        .with_config("stream", "issues");
        let entity_id = Uuid::new_v4();
        let new = NewSource::from_resolved(entity_id, resolved);
        assert_eq!(new.entity_id, entity_id);
        assert_eq!(new.config.get_str("stream"), Some("issues"));
        assert_eq!(new.name, "o/r");
    }
}
