//! Shape of a source on its platform (a channel, a feed, a repository, ...).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[sea_orm(string_value = "CHANNEL")]
    Channel,
    #[sea_orm(string_value = "PLAYLIST")]
    Playlist,
    #[sea_orm(string_value = "VIDEO")]
    Video,
    #[sea_orm(string_value = "FEED")]
    Feed,
    #[sea_orm(string_value = "REPO")]
    Repo,
    #[sea_orm(string_value = "SUBREDDIT")]
    Subreddit,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Channel => write!(f, "CHANNEL"),
            SourceType::Playlist => write!(f, "PLAYLIST"),
            SourceType::Video => write!(f, "VIDEO"),
            SourceType::Feed => write!(f, "FEED"),
            SourceType::Repo => write!(f, "REPO"),
            SourceType::Subreddit => write!(f, "SUBREDDIT"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "channel" => Ok(SourceType::Channel),
            "playlist" => Ok(SourceType::Playlist),
            "video" => Ok(SourceType::Video),
            "feed" => Ok(SourceType::Feed),
            "repo" | "repository" => Ok(SourceType::Repo),
            "subreddit" => Ok(SourceType::Subreddit),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("feed".parse::<SourceType>().unwrap(), SourceType::Feed);
        assert_eq!("Repository".parse::<SourceType>().unwrap(), SourceType::Repo);
        assert!("board".parse::<SourceType>().is_err());
    }
}
