pub(crate) mod entity;
pub(crate) mod item;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod output;
pub(crate) mod source;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use siphon::adapter::default_registry;
use siphon::store::SeaOrmItemStore;
use siphon::sync::SyncCoordinator;

use crate::config::Config;

/// `--active` / `--inactive` pair for listings.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub(crate) struct ActiveFlags {
    /// Only show active records
    #[arg(long, conflicts_with = "inactive")]
    active: bool,

    /// Only show inactive records
    #[arg(long)]
    inactive: bool,
}

impl ActiveFlags {
    pub(crate) fn filter(self) -> Option<bool> {
        match (self.active, self.inactive) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Build a coordinator over `db` with every compiled-in adapter.
pub(crate) fn coordinator(
    config: &Config,
    db: &Arc<DatabaseConnection>,
    no_rate_limit: bool,
) -> Result<SyncCoordinator, Box<dyn std::error::Error>> {
    if no_rate_limit {
        eprintln!("Warning: Rate limiting disabled - you may experience API throttling\n");
    }
    let registry = default_registry(&config.adapter_settings(no_rate_limit))?;
    let store = SeaOrmItemStore::new(Arc::clone(db));
    Ok(SyncCoordinator::new(Arc::new(store), Arc::new(registry)))
}

/// Format an optional timestamp for tables.
pub(crate) fn format_timestamp(
    ts: Option<&chrono::DateTime<chrono::FixedOffset>>,
) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_flags_map_to_filter() {
        assert_eq!(ActiveFlags::default().filter(), None);
        let active = ActiveFlags {
            active: true,
            inactive: false,
        };
        assert_eq!(active.filter(), Some(true));
        let inactive = ActiveFlags {
            active: false,
            inactive: true,
        };
        assert_eq!(inactive.filter(), Some(false));
    }

    #[test]
    fn missing_timestamp_renders_dash() {
        assert_eq!(format_timestamp(None), "-");
        let ts = chrono::DateTime::parse_from_rfc3339("2025-03-01T09:30:00+00:00").unwrap();
        assert_eq!(format_timestamp(Some(&ts)), "2025-03-01 09:30");
    }
}
