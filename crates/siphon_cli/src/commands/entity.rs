//! Entity management commands.
//!
//! Entities are the real-world subjects (people, organizations, topics) that
//! sources are attached to.

use clap::Subcommand;
use console::style;
use sea_orm::DatabaseConnection;
use tabled::Tabled;
use uuid::Uuid;

use siphon::EntityType;
use siphon::TrackedEntityModel;
use siphon::store::{EntityFilter, EntityUpdate, NewEntity, entities};

use super::ActiveFlags;
use super::output::{OutputFormat, print_rows, truncate};

/// Entity management subcommands.
#[derive(Subcommand)]
pub enum EntityAction {
    /// Add a new entity
    Add {
        /// Display name (e.g., "Rust Project")
        name: String,

        /// Entity type (organization, person, topic, product)
        #[arg(short = 't', long = "type", default_value = "organization")]
        entity_type: EntityType,

        /// Free-form description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List entities
    List {
        /// Filter by entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,

        /// Only entities whose name contains this text
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        active: ActiveFlags,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Rename an entity or change its type or description
    Update {
        /// Entity id
        id: Uuid,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,

        /// New description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,
    },
    /// Include entities in bulk syncs again
    Activate {
        /// Entity ids
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Exclude entities from bulk syncs (their sources stay untouched)
    Deactivate {
        /// Entity ids
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

/// Display struct for entity listing.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct EntityDisplay {
    #[tabled(rename = "ID")]
    id: Uuid,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    entity_type: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&TrackedEntityModel> for EntityDisplay {
    fn from(entity: &TrackedEntityModel) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            entity_type: entity.entity_type.to_string(),
            active: entity.active,
            description: truncate(entity.description.as_deref().unwrap_or(""), 48),
            created_at: entity.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Handle entity management commands.
pub async fn handle_entity(
    action: EntityAction,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        EntityAction::Add {
            name,
            entity_type,
            description,
        } => {
            let mut new = NewEntity::new(name, entity_type);
            if let Some(description) = description {
                new = new.with_description(description);
            }
            let entity = entities::create(db, new).await?;
            println!(
                "{} Added entity '{}' ({}) {}",
                style("✓").green().bold(),
                style(&entity.name).cyan(),
                entity.entity_type,
                style(entity.id).dim()
            );
        }
        EntityAction::List {
            entity_type,
            name,
            active,
            output,
        } => {
            let filter = EntityFilter {
                active: active.filter(),
                entity_type,
                name_contains: name,
            };
            let rows: Vec<EntityDisplay> = entities::list(db, &filter)
                .await?
                .iter()
                .map(EntityDisplay::from)
                .collect();
            print_rows(&rows, output, "No entities found.")?;
        }
        EntityAction::Update {
            id,
            name,
            entity_type,
            description,
            clear_description,
        } => {
            let changes = EntityUpdate {
                name,
                entity_type,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                active: None,
            };
            if changes.is_empty() {
                return Err("Nothing to update. Pass --name, --type or --description.".into());
            }
            let entity = entities::update(db, id, changes).await?;
            println!(
                "{} Updated entity '{}'",
                style("✓").green().bold(),
                style(&entity.name).cyan()
            );
        }
        EntityAction::Activate { ids } => {
            let changed = entities::set_active(db, &ids, true).await?;
            report_bulk("Activated", changed, ids.len());
        }
        EntityAction::Deactivate { ids } => {
            let changed = entities::set_active(db, &ids, false).await?;
            report_bulk("Deactivated", changed, ids.len());
        }
    }
    Ok(())
}

pub(crate) fn report_bulk(verb: &str, changed: u64, requested: usize) {
    println!(
        "{} {} {} of {} requested",
        style("✓").green().bold(),
        verb,
        changed,
        requested
    );
    if (changed as usize) < requested {
        println!(
            "{} {} id(s) did not match any record",
            style("⚠").yellow(),
            requested - changed as usize
        );
    }
}
