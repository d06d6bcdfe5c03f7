//! Batch repository for database operations
//!
//! Works against any SeaORM connection so pipelines can run it inside a
//! transaction as well as on the pool.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::batch::{self, BatchStatus, Entity as Batch};

/// Fields of a batch about to be created
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub company_id: Option<Uuid>,
    pub created_by: Uuid,
    pub original_filename: Option<String>,
    pub total_records: i32,
    pub status: BatchStatus,
}

/// Repository for batch database operations
pub struct BatchRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> BatchRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert a batch with zero processed records
    pub async fn create(&self, new: NewBatch) -> Result<batch::Model, RepositoryError> {
        let now = Utc::now().fixed_offset();
        let batch = batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(new.company_id),
            created_by: Set(Some(new.created_by)),
            original_filename: Set(new.original_filename),
            total_records: Set(new.total_records),
            processed_records: Set(0),
            status: Set(new.status),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = batch
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        tracing::info!(
            batch_id = %created.id,
            company_id = ?created.company_id,
            status = created.status.as_str(),
            "Created batch"
        );
        Ok(created)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<batch::Model>, RepositoryError> {
        Batch::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Batches in `scope`, newest first; `None` lists every batch
    pub async fn list(&self, scope: Option<Uuid>) -> Result<Vec<batch::Model>, RepositoryError> {
        let mut query = Batch::find();
        if let Some(company_id) = scope {
            query = query.filter(batch::Column::CompanyId.eq(company_id));
        }

        query
            .order_by_desc(batch::Column::CreatedAt)
            .order_by_desc(batch::Column::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Overwrite the counters and status of a batch
    pub async fn update_progress(
        &self,
        id: Uuid,
        total_records: Option<i32>,
        processed_records: i32,
        status: BatchStatus,
    ) -> Result<batch::Model, RepositoryError> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(format!("batch {id}")))?;

        let mut batch = existing.into_active_model();
        if let Some(total) = total_records {
            batch.total_records = Set(total);
        }
        batch.processed_records = Set(processed_records.max(0));
        batch.status = Set(status);
        batch.updated_at = Set(Utc::now().fixed_offset());

        batch
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Set only the status; returns whether a row was touched
    pub async fn set_status(&self, id: Uuid, status: BatchStatus) -> Result<bool, RepositoryError> {
        let result = Batch::update_many()
            .set(batch::ActiveModel {
                status: Set(status),
                updated_at: Set(Utc::now().fixed_offset()),
                ..Default::default()
            })
            .filter(batch::Column::Id.eq(id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected > 0)
    }
}
