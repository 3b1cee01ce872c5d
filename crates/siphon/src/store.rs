//! Persistence for entities, sources and items.
//!
//! Record-level operations are free functions grouped per table
//! ([`entities`], [`sources`], [`items`]). The sync coordinator only talks to
//! the database through the [`ItemStore`] trait.

mod errors;
mod item_store;

pub mod entities;
pub mod items;
pub mod sources;

#[cfg(test)]
pub(crate) mod memory;

pub use entities::{EntityFilter, EntityUpdate, NewEntity};
pub use errors::{Result, StoreError};
pub use item_store::{ItemStore, SeaOrmItemStore};
pub use items::{
    DEFAULT_LIST_LIMIT, ItemFilter, ItemPage, ItemRecord, ItemUpdate, Pagination, UpsertBatch,
    UpsertOutcome,
};
pub use sources::{NewSource, SourceFilter, SourceOverrides, SourceStateUpdate};

use sea_orm::sea_query::LikeExpr;

const LIKE_ESCAPE: char = '\\';

/// `LIKE` pattern matching `needle` anywhere, with `%` and `_` taken literally.
///
/// SQLite folds ASCII case only; [`ItemFilter::matches`] mirrors that.
pub(crate) fn contains_pattern(needle: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}
