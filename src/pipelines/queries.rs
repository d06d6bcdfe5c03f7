//! Tenant-checked reads over batches and their records.

use uuid::Uuid;

use super::PipelineContext;
use crate::error::PipelineError;
use crate::models::batch::{self, BatchRead};
use crate::models::record::RecordRead;
use crate::repositories::{BatchRepository, RecordRepository};
use crate::tenancy::{Actor, TenantId, authorize_resource, resolve_scope};

async fn authorized_batch(
    ctx: &PipelineContext,
    actor: &Actor,
    batch_id: Uuid,
) -> Result<batch::Model, PipelineError> {
    let batch = BatchRepository::new(ctx.db.as_ref())
        .find_by_id(batch_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("batch", batch_id))?;
    authorize_resource(actor, batch.company_id)?;
    Ok(batch)
}

pub async fn get_batch(
    ctx: &PipelineContext,
    actor: &Actor,
    batch_id: Uuid,
) -> Result<BatchRead, PipelineError> {
    authorized_batch(ctx, actor, batch_id).await.map(Into::into)
}

/// Batches visible in the resolved scope, newest first
pub async fn list_batches(
    ctx: &PipelineContext,
    actor: &Actor,
    tenant_scope: Option<TenantId>,
) -> Result<Vec<BatchRead>, PipelineError> {
    let scope = resolve_scope(actor, tenant_scope)?;
    let batches = BatchRepository::new(ctx.db.as_ref()).list(scope).await?;
    Ok(batches.into_iter().map(Into::into).collect())
}

pub async fn list_batch_records(
    ctx: &PipelineContext,
    actor: &Actor,
    batch_id: Uuid,
) -> Result<Vec<RecordRead>, PipelineError> {
    let batch = authorized_batch(ctx, actor, batch_id).await?;
    let records = RecordRepository::new(ctx.db.as_ref())
        .find_by_batch(batch.id)
        .await?;
    Ok(records.into_iter().map(Into::into).collect())
}
