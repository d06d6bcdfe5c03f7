//! Single typed-in record, stored as a one-record batch.

use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use utoipa::ToSchema;

use super::PipelineContext;
use crate::audit::AuditEvent;
use crate::error::PipelineError;
use crate::models::batch::BatchStatus;
use crate::models::record::RecordRead;
use crate::repositories::{BatchRepository, NewBatch, NewRecord, RecordRepository};
use crate::tenancy::{Actor, TenantId, resolve_scope};

/// Roster fields of a typed-in record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecordInput {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub office_phone: Option<String>,
}

impl RecordInput {
    fn into_new_record(self) -> Result<NewRecord, PipelineError> {
        let full_name = required(self.full_name, "full_name")?;
        let email = required(self.email, "email")?;
        Ok(NewRecord {
            full_name,
            email,
            mobile_phone: optional(self.mobile_phone),
            job_title: optional(self.job_title),
            office_phone: optional(self.office_phone),
        })
    }
}

fn required(value: String, field: &str) -> Result<String, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Create a pending one-record batch holding `input`
#[instrument(skip(ctx, actor, input), fields(actor_id = %actor.id))]
pub async fn create_single(
    ctx: &PipelineContext,
    tenant_scope: Option<TenantId>,
    actor: &Actor,
    input: RecordInput,
) -> Result<RecordRead, PipelineError> {
    let scope = resolve_scope(actor, tenant_scope)?;
    let new_record = input.into_new_record()?;

    let txn = ctx.db.begin().await?;
    let batch = BatchRepository::new(&txn)
        .create(NewBatch {
            company_id: scope,
            created_by: actor.id,
            original_filename: None,
            total_records: 1,
            status: BatchStatus::Pending,
        })
        .await?;
    let records = RecordRepository::new(&txn);
    records.insert_many(&batch, vec![new_record]).await?;
    let record = records
        .find_by_batch(batch.id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::not_found("record", batch.id))?;
    txn.commit().await?;

    tracing::info!(batch_id = %batch.id, record_id = %record.id, "Record created");

    ctx.audit.emit(AuditEvent::record(
        actor.id,
        record.id,
        "create",
        json!({ "via": "typed" }),
    ));

    Ok(record.into())
}
