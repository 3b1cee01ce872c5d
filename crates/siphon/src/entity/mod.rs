//! SeaORM entity definitions for the siphon database schema.

pub mod entity_type;
pub mod item;
pub mod platform;
pub mod prelude;
pub mod source;
pub mod source_type;
pub mod tracked_entity;
