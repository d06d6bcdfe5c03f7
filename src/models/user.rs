//! User entity model
//!
//! Users are read-only for the ingestion core. They act as the authenticated
//! principal and as the source of card profiles when a batch is synthesized
//! from stored entities.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role attached to every user
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform-wide principal, never tenant scoped
    #[sea_orm(string_value = "owner")]
    Owner,
    #[sea_orm(string_value = "administrator")]
    Administrator,
    #[sea_orm(string_value = "collaborator")]
    Collaborator,
    #[sea_orm(string_value = "standard")]
    Standard,
}

impl Role {
    /// Owners and administrators may run elevated operations
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Owner | Role::Administrator)
    }
}

/// User entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Login email, unique
    pub email: String,

    /// Opaque password hash; never interpreted by this service
    pub hashed_password: String,

    pub role: Role,

    pub is_active: bool,

    /// Tenant the user belongs to (None for owners)
    pub company_id: Option<Uuid>,

    /// Card profile fields used when synthesizing records
    pub card_full_name: Option<String>,
    pub card_email: Option<String>,
    pub card_mobile_phone: Option<String>,
    pub card_job_title: Option<String>,
    pub card_office_phone: Option<String>,

    /// Timestamp when the user was created
    pub created_at: DateTimeWithTimeZone,
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
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
