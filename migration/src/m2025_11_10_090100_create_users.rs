//! Migration to create the users table.
//!
//! Users double as the authenticated actors (role + optional company scope)
//! and as the source entities for batches synthesized from stored profiles.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).text().not_null().unique_key())
                    .col(ColumnDef::new(Users::HashedPassword).text().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(32)
                            .not_null()
                            .default("standard"),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::CompanyId).uuid().null())
                    .col(ColumnDef::new(Users::CardFullName).text().null())
                    .col(ColumnDef::new(Users::CardEmail).text().null())
                    .col(ColumnDef::new(Users::CardMobilePhone).text().null())
                    .col(ColumnDef::new(Users::CardJobTitle).text().null())
                    .col(ColumnDef::new(Users::CardOfficePhone).text().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_company_id")
                            .from(Users::Table, Users::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_company_id")
                    .table(Users::Table)
                    .col(Users::CompanyId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_users_company_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    HashedPassword,
    Role,
    IsActive,
    CompanyId,
    CardFullName,
    CardEmail,
    CardMobilePhone,
    CardJobTitle,
    CardOfficePhone,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}
