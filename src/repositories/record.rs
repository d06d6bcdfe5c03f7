//! Record repository for database operations

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::batch;
use crate::models::record::{self, Entity as Record, RecordStatus};
use crate::rows::RowCandidate;

/// Rows per INSERT statement; keeps bind parameters well under backend limits
const INSERT_ROWS_PER_STATEMENT: usize = 1000;

/// Roster fields of a record about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub full_name: String,
    pub email: String,
    pub mobile_phone: Option<String>,
    pub job_title: Option<String>,
    pub office_phone: Option<String>,
}

impl From<RowCandidate> for NewRecord {
    fn from(row: RowCandidate) -> Self {
        Self {
            full_name: row.full_name,
            email: row.email,
            mobile_phone: row.mobile_phone,
            job_title: Some(row.job_title),
            office_phone: row.office_phone,
        }
    }
}

impl NewRecord {
    /// Active model for a pending record owned by `batch`
    pub fn into_active_model(self, batch: &batch::Model) -> record::ActiveModel {
        let now = Utc::now().fixed_offset();
        record::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch.id),
            company_id: Set(batch.company_id),
            created_by: Set(batch.created_by),
            full_name: Set(self.full_name),
            email: Set(self.email),
            mobile_phone: Set(self.mobile_phone),
            job_title: Set(self.job_title),
            office_phone: Set(self.office_phone),
            status: Set(RecordStatus::Pending),
            artifact_filename: Set(None),
            generated_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// Repository for record database operations
pub struct RecordRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RecordRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert records for `batch`, returning how many were written
    pub async fn insert_many(
        &self,
        batch: &batch::Model,
        records: Vec<NewRecord>,
    ) -> Result<u64, RepositoryError> {
        let mut inserted = 0u64;
        let mut models = records
            .into_iter()
            .map(|record| record.into_active_model(batch))
            .peekable();

        while models.peek().is_some() {
            let chunk: Vec<_> = models.by_ref().take(INSERT_ROWS_PER_STATEMENT).collect();
            let len = chunk.len() as u64;
            Record::insert_many(chunk)
                .exec_without_returning(self.db)
                .await
                .map_err(RepositoryError::database_error)?;
            inserted += len;
        }

        Ok(inserted)
    }

    pub async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<record::Model>, RepositoryError> {
        Record::find()
            .filter(record::Column::BatchId.eq(batch_id))
            .order_by_asc(record::Column::CreatedAt)
            .order_by_asc(record::Column::Email)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Ids of every record in the batch, without loading the rows
    pub async fn ids_for_batch(&self, batch_id: Uuid) -> Result<HashSet<Uuid>, RepositoryError> {
        let ids: Vec<Uuid> = Record::find()
            .select_only()
            .column(record::Column::Id)
            .filter(record::Column::BatchId.eq(batch_id))
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(ids.into_iter().collect())
    }

    pub async fn count_for_batch(&self, batch_id: Uuid) -> Result<u64, RepositoryError> {
        Record::find()
            .filter(record::Column::BatchId.eq(batch_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_generated(&self, batch_id: Uuid) -> Result<u64, RepositoryError> {
        Record::find()
            .filter(record::Column::BatchId.eq(batch_id))
            .filter(record::Column::Status.eq(RecordStatus::Generated))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Point the record at its artifact and mark it generated in one statement
    pub async fn attach_artifact(
        &self,
        id: Uuid,
        artifact_filename: &str,
        generated_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        let result = Record::update_many()
            .set(record::ActiveModel {
                artifact_filename: Set(Some(artifact_filename.to_string())),
                generated_at: Set(Some(generated_at)),
                status: Set(RecordStatus::Generated),
                updated_at: Set(Utc::now().fixed_offset()),
                ..Default::default()
            })
            .filter(record::Column::Id.eq(id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::not_found(format!("record {id}")));
        }
        Ok(())
    }
}
