//! Initial migration creating entities, sources and items.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_entities(manager).await?;
        self.create_sources(manager).await?;
        self.create_items(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entities::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_entities(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entities::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Entities::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Entities::Name).string().not_null())
                    .col(ColumnDef::new(Entities::EntityType).string().not_null())
                    .col(ColumnDef::new(Entities::Description).text().null())
                    .col(
                        ColumnDef::new(Entities::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Entities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Entities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entities_name")
                    .table(Entities::Table)
                    .col(Entities::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sources(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sources::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sources::EntityId).uuid().not_null())
                    // Identity
                    .col(ColumnDef::new(Sources::Platform).string().not_null())
                    .col(ColumnDef::new(Sources::SourceType).string().not_null())
                    .col(
                        ColumnDef::new(Sources::SourceIdentifier)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sources::Url).text().not_null())
                    .col(ColumnDef::new(Sources::Name).string().not_null())
                    // Settings and sync state
                    .col(
                        ColumnDef::new(Sources::Config)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(Sources::Metadata)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(ColumnDef::new(Sources::LastSyncedCursor).text().null())
                    .col(
                        ColumnDef::new(Sources::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Sources::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    // Timestamps
                    .col(
                        ColumnDef::new(Sources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Sources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sources_entity")
                            .from(Sources::Table, Sources::EntityId)
                            .to(Entities::Table, Entities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One source per (entity, platform, identifier)
        manager
            .create_index(
                Index::create()
                    .name("idx_sources_entity_platform_identifier")
                    .table(Sources::Table)
                    .col(Sources::EntityId)
                    .col(Sources::Platform)
                    .col(Sources::SourceIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sources_active")
                    .table(Sources::Table)
                    .col(Sources::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_items(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Items::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Items::SourceId).uuid().not_null())
                    .col(
                        ColumnDef::new(Items::ExternalIdentifier)
                            .string()
                            .not_null(),
                    )
                    // Content
                    .col(ColumnDef::new(Items::Title).text().not_null())
                    .col(ColumnDef::new(Items::Content).text().null())
                    .col(
                        ColumnDef::new(Items::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Items::Fields)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    // Tracking
                    .col(
                        ColumnDef::new(Items::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Items::FirstSeenAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Items::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_items_source")
                            .from(Items::Table, Items::SourceId)
                            .to(Sources::Table, Sources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Deduplication key for sync runs
        manager
            .create_index(
                Index::create()
                    .name("idx_items_source_external_identifier")
                    .table(Items::Table)
                    .col(Items::SourceId)
                    .col(Items::ExternalIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Item search filters
        manager
            .create_index(
                Index::create()
                    .name("idx_items_published_at")
                    .table(Items::Table)
                    .col(Items::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_items_active")
                    .table(Items::Table)
                    .col(Items::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "entities")]
enum Entities {
    Table,
    Id,
    Name,
    EntityType,
    Description,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "sources")]
enum Sources {
    Table,
    Id,
    EntityId,
    Platform,
    SourceType,
    SourceIdentifier,
    Url,
    Name,
    Config,
    Metadata,
    LastSyncedCursor,
    LastSyncedAt,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "items")]
enum Items {
    Table,
    Id,
    SourceId,
    ExternalIdentifier,
    Title,
    Content,
    PublishedAt,
    Fields,
    Active,
    FirstSeenAt,
    UpdatedAt,
}
