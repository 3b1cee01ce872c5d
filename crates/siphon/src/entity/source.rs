//! Source entity - one place on one platform that items are fetched from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::platform::Platform;
use crate::entity::source_type::SourceType;
use crate::value::ConfigMap;

/// Source model.
///
/// `(entity_id, platform, source_identifier)` is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sources")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning entity.
    pub entity_id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub platform: Platform,
    pub source_type: SourceType,
    /// Platform-native identifier (channel id, `owner/repo`, subreddit name,
    /// feed host and path).
    pub source_identifier: String,
    /// Canonical URL the source was created from.
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub name: String,

    // ─── Settings ────────────────────────────────────────────────────────────
    /// Adapter settings, e.g. `{"stream": "issues"}` for GitHub.
    #[sea_orm(column_type = "Json")]
    pub config: ConfigMap,

    // ─── Sync State ──────────────────────────────────────────────────────────
    /// Counters and diagnostics written after each sync run.
    #[sea_orm(column_type = "Json")]
    pub metadata: ConfigMap,
    /// Opaque position of the newest item seen by the last successful run.
    #[sea_orm(column_type = "Text", nullable)]
    pub last_synced_cursor: Option<String>,
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(default_value = true)]
    pub active: bool,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A source belongs to an entity.
    #[sea_orm(
        belongs_to = "super::tracked_entity::Entity",
        from = "Column::EntityId",
        to = "super::tracked_entity::Column::Id"
    )]
    TrackedEntity,
    /// A source has many items.
    #[sea_orm(has_many = "super::item::Entity")]
    Items,
}

impl Related<super::tracked_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackedEntity.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Look up a string setting from `config`.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get_str(key)
    }
}
