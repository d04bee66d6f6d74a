//! Create the entries and workers tables
//!
//! Entry and worker rows are keyed by generated names; `workers.worker_id`
//! is the externally presented identifier and must be unique.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entries::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entries::EntryId).string().null())
                    .col(ColumnDef::new(Entries::OsRelease).string().not_null())
                    .col(ColumnDef::new(Entries::Sha256Sum).string().not_null())
                    .col(ColumnDef::new(Entries::Repository).string().not_null())
                    .col(ColumnDef::new(Entries::State).text().not_null())
                    .col(
                        ColumnDef::new(Entries::CommitHash)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Entries::CommitUri)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Entries::CommitBranch)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Entries::CommitTag)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Entries::Pkg).string().not_null().default(""))
                    .col(ColumnDef::new(Entries::WorkerId).string().not_null())
                    .col(
                        ColumnDef::new(Entries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Entries::UpdatedAt)
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
                    .name("idx_entries_entry_id")
                    .table(Entries::Table)
                    .col(Entries::EntryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entries_state")
                    .table(Entries::Table)
                    .col(Entries::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Workers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Workers::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Workers::WorkerId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Workers::ApiSecret).string().not_null())
                    .col(
                        ColumnDef::new(Workers::LastCheckinTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Workers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Workers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entries::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Entries {
    Table,
    Name,
    EntryId,
    OsRelease,
    Sha256Sum,
    Repository,
    State,
    CommitHash,
    CommitUri,
    CommitBranch,
    CommitTag,
    Pkg,
    WorkerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Workers {
    Table,
    Name,
    WorkerId,
    ApiSecret,
    LastCheckinTime,
    CreatedAt,
}
