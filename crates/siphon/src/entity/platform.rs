//! Content platforms that sources live on.
//!
//! A platform names the upstream service (and therefore the adapter) used to
//! fetch a source's items. Each platform only hosts certain source types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::source_type::SourceType;

/// Supported content platforms.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    /// YouTube Data API v3
    #[sea_orm(string_value = "YOUTUBE")]
    #[serde(rename = "YOUTUBE")]
    YouTube,
    /// Any RSS 2.0 or Atom feed
    #[sea_orm(string_value = "RSS")]
    Rss,
    /// github.com REST API
    #[sea_orm(string_value = "GITHUB")]
    #[serde(rename = "GITHUB")]
    GitHub,
    /// Reddit public JSON listings
    #[sea_orm(string_value = "REDDIT")]
    Reddit,
}

impl Platform {
    /// Source types this platform can host.
    pub fn source_types(&self) -> &'static [SourceType] {
        match self {
            Platform::YouTube => &[SourceType::Channel, SourceType::Playlist, SourceType::Video],
            Platform::Rss => &[SourceType::Feed],
            Platform::GitHub => &[SourceType::Repo],
            Platform::Reddit => &[SourceType::Subreddit, SourceType::Feed],
        }
    }

    pub fn supports(&self, source_type: SourceType) -> bool {
        self.source_types().contains(&source_type)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::YouTube => write!(f, "YOUTUBE"),
            Platform::Rss => write!(f, "RSS"),
            Platform::GitHub => write!(f, "GITHUB"),
            Platform::Reddit => write!(f, "REDDIT"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "rss" | "atom" | "feed" => Ok(Platform::Rss),
            "github" => Ok(Platform::GitHub),
            "reddit" => Ok(Platform::Reddit),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}
