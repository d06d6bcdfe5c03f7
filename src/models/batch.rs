//! Batch entity model
//!
//! A batch groups the records created by one ingestion, synthesis or
//! single-record call. Its counters and status are only ever written by the
//! pipeline that owns it; see [`crate::state`] for the transition rules.

use chrono::{DateTime, FixedOffset};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of a batch
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Records stored, no artifacts reconciled yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Ingestion or reconciliation in progress, or artifacts partially reconciled
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Every record has an artifact
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Ingestion aborted
    #[sea_orm(string_value = "error")]
    Error,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        }
    }
}

/// Batch entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    /// Unique identifier for the batch (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant scope; None for global batches
    pub company_id: Option<Uuid>,

    /// Actor that created the batch
    pub created_by: Option<Uuid>,

    /// Name of the uploaded workbook, when the batch came from one
    pub original_filename: Option<String>,

    pub total_records: i32,

    pub processed_records: i32,

    pub status: BatchStatus,

    /// Timestamp when the batch was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the batch was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id",
        on_delete = "Cascade"
    )]
    Company,
    #[sea_orm(has_many = "super::record::Entity")]
    Records,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Snapshot of a batch returned by every pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchRead {
    pub id: Uuid,
    pub original_filename: Option<String>,
    pub total_records: i32,
    pub processed_records: i32,
    pub status: BatchStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
}

impl From<Model> for BatchRead {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            original_filename: model.original_filename,
            total_records: model.total_records,
            processed_records: model.processed_records,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

impl From<&Model> for BatchRead {
    fn from(model: &Model) -> Self {
        model.clone().into()
    }
}
