//! Kind of real-world subject an entity represents.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a tracked entity is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    #[sea_orm(string_value = "ORGANIZATION")]
    Organization,
    #[sea_orm(string_value = "PERSON")]
    Person,
    #[sea_orm(string_value = "TOPIC")]
    Topic,
    #[sea_orm(string_value = "PRODUCT")]
    Product,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Organization => write!(f, "ORGANIZATION"),
            EntityType::Person => write!(f, "PERSON"),
            EntityType::Topic => write!(f, "TOPIC"),
            EntityType::Product => write!(f, "PRODUCT"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "organization" | "org" => Ok(EntityType::Organization),
            "person" => Ok(EntityType::Person),
            "topic" => Ok(EntityType::Topic),
            "product" => Ok(EntityType::Product),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}
