//! # Repository Layer
//!
//! This module contains repository implementations that encapsulate SeaORM operations
//! for database entities. Repositories borrow any [`sea_orm::ConnectionTrait`] so the
//! same code runs on the pool or inside a transaction.

pub mod audit_log;
pub mod batch;
pub mod record;
pub mod user;

pub use audit_log::AuditLogRepository;
pub use batch::{BatchRepository, NewBatch};
pub use record::{NewRecord, RecordRepository};
pub use user::UserRepository;
