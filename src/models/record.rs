//! Record entity model
//!
//! One roster entry. `status = generated` holds exactly when
//! `artifact_filename` is set.

use chrono::{DateTime, FixedOffset};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Artifact generation status of a record
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "generating")]
    Generating,
    #[sea_orm(string_value = "generated")]
    Generated,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Record entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "records")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning batch
    pub batch_id: Uuid,

    /// Tenant scope, copied from the batch
    pub company_id: Option<Uuid>,

    pub created_by: Option<Uuid>,

    pub full_name: String,

    pub email: String,

    pub mobile_phone: Option<String>,

    pub job_title: Option<String>,

    pub office_phone: Option<String>,

    pub status: RecordStatus,

    /// Artifact path relative to the artifacts namespace root
    pub artifact_filename: Option<String>,

    /// When the artifact was attached
    pub generated_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id",
        on_delete = "Cascade"
    )]
    Batch,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Public view of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecordRead {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub mobile_phone: Option<String>,
    pub job_title: Option<String>,
    pub office_phone: Option<String>,
    pub status: RecordStatus,
    pub artifact_filename: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub generated_at: Option<DateTime<FixedOffset>>,
}

impl From<Model> for RecordRead {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            batch_id: model.batch_id,
            full_name: model.full_name,
            email: model.email,
            mobile_phone: model.mobile_phone,
            job_title: model.job_title,
            office_phone: model.office_phone,
            status: model.status,
            artifact_filename: model.artifact_filename,
            generated_at: model.generated_at,
        }
    }
}
