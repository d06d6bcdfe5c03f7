//! Database migrations for the Rosters API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_090000_create_companies;
mod m2025_11_10_090100_create_users;
mod m2025_11_10_090200_create_batches;
mod m2025_11_10_090300_create_records;
mod m2025_11_10_090400_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_090000_create_companies::Migration),
            Box::new(m2025_11_10_090100_create_users::Migration),
            Box::new(m2025_11_10_090200_create_batches::Migration),
            Box::new(m2025_11_10_090300_create_records::Migration),
            Box::new(m2025_11_10_090400_create_audit_logs::Migration),
        ]
    }
}
