//! Siphon - incremental content ingestion from heterogeneous platforms.
//!
//! This library pulls content items (videos, feed entries, repository releases,
//! forum posts) from external platforms into a normalized store. Repeated
//! synchronization runs are incremental and idempotent: items are deduplicated on
//! `(source_id, external_identifier)` and only changed items are rewritten.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support via [`connect_and_migrate`].
//! - `sqlite` - Enables the SQLite driver.
//! - `youtube`, `rss`, `github`, `reddit` - Compile the matching platform adapter.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use siphon::adapter::{AdapterSettings, default_registry};
//! use siphon::store::SeaOrmItemStore;
//! use siphon::sync::{SyncCoordinator, SyncOptions};
//!
//! let db = Arc::new(siphon::connect_and_migrate("sqlite://siphon.db?mode=rwc").await?);
//! let registry = default_registry(&AdapterSettings::default())?;
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(SeaOrmItemStore::new(db)),
//!     Arc::new(registry),
//! );
//!
//! let report = coordinator.run(source_id, &SyncOptions::default(), None).await?;
//! println!("inserted {} updated {}", report.inserted, report.updated);
//! ```

pub mod activation;
pub mod adapter;
pub mod db;
pub mod entity;
pub mod http;
pub mod model;
pub mod retry;
pub mod search;
pub mod store;
pub mod sync;
pub mod value;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use model::{CanonicalItem, FieldProjection, MaxResults, RawPayload};
pub use store::StoreError;
pub use sync::{SyncError, SyncReport};
pub use value::{ConfigMap, ConfigValue};
