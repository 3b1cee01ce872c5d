//! Item entity - one piece of content (a video, an entry, a release, a post).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Item model.
///
/// `(source_id, external_identifier)` is unique and is the deduplication key
/// used by sync runs.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub source_id: Uuid,
    /// Platform-native identifier, stable across runs.
    pub external_identifier: String,

    // ─── Content ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    pub published_at: Option<DateTimeWithTimeZone>,
    /// Platform-specific fields produced by the adapter (counts, urls, authors).
    #[sea_orm(column_type = "Json")]
    pub fields: serde_json::Value,

    // ─── Tracking ────────────────────────────────────────────────────────────
    /// Curation flag; sync never changes it.
    #[sea_orm(default_value = true)]
    pub active: bool,
    pub first_seen_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::source::Entity",
        from = "Column::SourceId",
        to = "super::source::Column::Id"
    )]
    Source,
}

impl Related<super::source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Source.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
