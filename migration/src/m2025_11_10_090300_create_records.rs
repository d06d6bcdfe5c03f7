//! Migration to create the records table.
//!
//! One row per roster entry. Records cascade with their owning batch and carry
//! the artifact path once a generated file has been matched.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Records::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Records::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Records::BatchId).uuid().not_null())
                    .col(ColumnDef::new(Records::CompanyId).uuid().null())
                    .col(ColumnDef::new(Records::CreatedBy).uuid().null())
                    .col(ColumnDef::new(Records::FullName).text().not_null())
                    .col(ColumnDef::new(Records::Email).text().not_null())
                    .col(ColumnDef::new(Records::MobilePhone).text().null())
                    .col(ColumnDef::new(Records::JobTitle).text().null())
                    .col(ColumnDef::new(Records::OfficePhone).text().null())
                    .col(
                        ColumnDef::new(Records::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Records::ArtifactFilename).text().null())
                    .col(
                        ColumnDef::new(Records::GeneratedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Records::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Records::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_records_batch_id")
                            .from(Records::Table, Records::BatchId)
                            .to(Batches::Table, Batches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_records_company_id")
                            .from(Records::Table, Records::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_records_batch_id")
                    .table(Records::Table)
                    .col(Records::BatchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_records_email")
                    .table(Records::Table)
                    .col(Records::Email)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_records_batch_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_records_email").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Records::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Records {
    Table,
    Id,
    BatchId,
    CompanyId,
    CreatedBy,
    FullName,
    Email,
    MobilePhone,
    JobTitle,
    OfficePhone,
    Status,
    ArtifactFilename,
    GeneratedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Batches {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}
