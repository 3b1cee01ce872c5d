//! Common re-exports for convenient entity usage.

pub use super::entity_type::EntityType;
pub use super::item::{
    ActiveModel as ItemActiveModel, Column as ItemColumn, Entity as Item, Model as ItemModel,
};
pub use super::platform::Platform;
pub use super::source::{
    ActiveModel as SourceActiveModel, Column as SourceColumn, Entity as Source,
    Model as SourceModel,
};
pub use super::source_type::SourceType;
pub use super::tracked_entity::{
    ActiveModel as TrackedEntityActiveModel, Column as TrackedEntityColumn,
    Entity as TrackedEntity, Model as TrackedEntityModel,
};
