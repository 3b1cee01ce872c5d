use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::entity_type::EntityType;
use crate::entity::tracked_entity::{ActiveModel, Column, Entity as TrackedEntity, Model};

use super::errors::{Result, StoreError};

/// Input for [`create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub description: Option<String>,
}

impl NewEntity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update for [`update`]; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<EntityType>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

impl EntityUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.entity_type.is_none()
            && self.description.is_none()
            && self.active.is_none()
    }
}

/// Predicates for [`list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub active: Option<bool>,
    pub entity_type: Option<EntityType>,
    pub name_contains: Option<String>,
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::invalid_input("entity name must not be empty"));
    }
    Ok(name.to_string())
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Create an entity.
///
/// # Errors
/// Returns `StoreError::InvalidInput` for a blank name.
pub async fn create(db: &DatabaseConnection, new: NewEntity) -> Result<Model> {
    let now = Utc::now().fixed_offset();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(validated_name(&new.name)?),
        entity_type: Set(new.entity_type),
        description: Set(new.description.filter(|d| !d.trim().is_empty())),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = model.insert(db).await?;
    tracing::debug!(entity_id = %created.id, name = %created.name, "Created entity");
    Ok(created)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    TrackedEntity::find_by_id(id)
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// Like [`find_by_id`], but a miss is `StoreError::NotFound`.
pub async fn get(db: &DatabaseConnection, id: Uuid) -> Result<Model> {
    find_by_id(db, id)
        .await?
        .ok_or_else(|| StoreError::not_found_by_id("entity", id))
}

/// Apply a partial update.
///
/// Deactivating an entity leaves its sources untouched.
pub async fn update(db: &DatabaseConnection, id: Uuid, changes: EntityUpdate) -> Result<Model> {
    let existing = get(db, id).await?;
    if changes.is_empty() {
        return Ok(existing);
    }

    let mut model: ActiveModel = existing.into();
    if let Some(name) = changes.name {
        model.name = Set(validated_name(&name)?);
    }
    if let Some(entity_type) = changes.entity_type {
        model.entity_type = Set(entity_type);
    }
    if let Some(description) = changes.description {
        model.description = Set(description.filter(|d| !d.trim().is_empty()));
    }
    if let Some(active) = changes.active {
        model.active = Set(active);
    }
    model.updated_at = Set(Utc::now().fixed_offset());

    model.update(db).await.map_err(StoreError::from)
}

/// List entities ordered by name.
pub async fn list(db: &DatabaseConnection, filter: &EntityFilter) -> Result<Vec<Model>> {
    let mut condition = Condition::all();
    if let Some(active) = filter.active {
        condition = condition.add(Column::Active.eq(active));
    }
    if let Some(entity_type) = filter.entity_type {
        condition = condition.add(Column::EntityType.eq(entity_type));
    }
    if let Some(needle) = filter.name_contains.as_deref().filter(|n| !n.is_empty()) {
        condition = condition.add(Column::Name.like(super::contains_pattern(needle)));
    }

    TrackedEntity::find()
        .filter(condition)
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Bulk (de)activate entities. Returns the number of rows changed.
pub async fn set_active(db: &DatabaseConnection, ids: &[Uuid], active: bool) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = TrackedEntity::update_many()
        .col_expr(Column::Active, active.into())
        .col_expr(Column::UpdatedAt, Utc::now().fixed_offset().into())
        .filter(Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use crate::connect_and_migrate;

    async fn setup() -> DatabaseConnection {
        connect_and_migrate("sqlite::memory:")
            .await
            .expect("test database")
    }

    #[tokio::test]
    async fn create_trims_and_rejects_blank_names() {
        let db = setup().await;
        let entity = create(&db, NewEntity::new("  Rust Foundation ", EntityType::Organization))
            .await
            .expect("create");
        assert_eq!(entity.name, "Rust Foundation");
        assert!(entity.active);

        let err = create(&db, NewEntity::new("   ", EntityType::Person))
            .await
            .expect_err("blank name");
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let db = setup().await;
        let entity = create(
            &db,
            NewEntity::new("Tokio", EntityType::Product).with_description("async runtime"),
        )
        .await
        .unwrap();

        let updated = update(
            &db,
            entity.id,
            EntityUpdate {
                entity_type: Some(EntityType::Topic),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Tokio");
        assert_eq!(updated.entity_type, EntityType::Topic);
        assert_eq!(updated.description, None);

        let missing = update(&db, Uuid::new_v4(), EntityUpdate::default()).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_filters_and_set_active() {
        let db = setup().await;
        let a = create(&db, NewEntity::new("Alpha Labs", EntityType::Organization))
            .await
            .unwrap();
        create(&db, NewEntity::new("Beta", EntityType::Person))
            .await
            .unwrap();

        assert_eq!(set_active(&db, &[a.id], false).await.unwrap(), 1);

        let active = list(
            &db,
            &EntityFilter {
                active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Beta");

        let by_name = list(
            &db,
            &EntityFilter {
                name_contains: Some("Labs".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert!(!by_name[0].active);
    }
}
