//! AuditLog entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Append-only audit trail entry
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub timestamp: DateTimeWithTimeZone,

    /// Acting user, if known
    pub user_id: Option<Uuid>,

    /// Kind of entity touched (e.g. "batch", "record")
    pub entity_type: String,

    pub entity_id: Uuid,

    /// Verb describing the change (e.g. "ingest", "upload_artifacts")
    pub action: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub details: JsonValue,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
