//! Audit log repository

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::error::RepositoryError;
use crate::models::audit_log::{self, Entity as AuditLog};

pub struct AuditLogRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> AuditLogRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(&self, event: AuditEvent) -> Result<audit_log::Model, RepositoryError> {
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            timestamp: Set(Utc::now().fixed_offset()),
            user_id: Set(event.actor_id),
            entity_type: Set(event.entity_type.to_string()),
            entity_id: Set(event.entity_id),
            action: Set(event.action.to_string()),
            details: Set(event.details),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Entries for one entity, oldest first
    pub async fn for_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Vec<audit_log::Model>, RepositoryError> {
        AuditLog::find()
            .filter(audit_log::Column::EntityType.eq(entity_type))
            .filter(audit_log::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_log::Column::Timestamp)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
