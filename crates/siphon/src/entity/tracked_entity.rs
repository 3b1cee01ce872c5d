//! Tracked entity - a real-world subject (an organization, a person) whose
//! content is followed across one or more sources.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::entity_type::EntityType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entities")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name.
    pub name: String,
    pub entity_type: EntityType,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Inactive entities are excluded from bulk syncs.
    #[sea_orm(default_value = true)]
    pub active: bool,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// An entity has many sources.
    #[sea_orm(has_many = "super::source::Entity")]
    Sources,
}

impl Related<super::source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
