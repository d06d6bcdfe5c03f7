//! Batch synthesis from users that already exist in a company.

use std::collections::{HashMap, HashSet};

use sea_orm::TransactionTrait;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use super::PipelineContext;
use crate::audit::AuditEvent;
use crate::error::PipelineError;
use crate::models::batch::{BatchRead, BatchStatus};
use crate::models::user;
use crate::repositories::{BatchRepository, NewBatch, NewRecord, RecordRepository, UserRepository};
use crate::tenancy::{Actor, TenantId, require_elevated, resolve_scope};

/// Create one pending record per user, all or nothing.
///
/// Every id must name a user of the resolved company; otherwise the call
/// fails with `NotFound` listing the missing ids in input order and nothing
/// is written.
#[instrument(skip(ctx, actor, entity_ids), fields(actor_id = %actor.id, requested = entity_ids.len()))]
pub async fn synthesize(
    ctx: &PipelineContext,
    tenant_scope: Option<TenantId>,
    actor: &Actor,
    entity_ids: &[Uuid],
) -> Result<BatchRead, PipelineError> {
    require_elevated(actor)?;
    if entity_ids.is_empty() {
        return Err(PipelineError::InvalidInput(
            "at least one user id is required".to_string(),
        ));
    }

    let ids = dedup_in_order(entity_ids);
    let company_id = resolve_scope(actor, tenant_scope)?.ok_or(PipelineError::TenantRequired)?;

    let users = UserRepository::new(ctx.db.as_ref())
        .find_in_company(&ids, company_id)
        .await?;
    let by_id: HashMap<Uuid, &user::Model> = users.iter().map(|user| (user.id, user)).collect();
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !by_id.contains_key(id))
        .map(Uuid::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::NotFound {
            entity: "users",
            ids: missing,
        });
    }

    // Build in request order, not query order.
    let records: Vec<NewRecord> = ids
        .iter()
        .filter_map(|id| by_id.get(id).copied())
        .map(record_from_user)
        .collect();
    let total = i32::try_from(records.len())
        .map_err(|_| PipelineError::InvalidInput("too many users".to_string()))?;

    let txn = ctx.db.begin().await?;
    let batch = BatchRepository::new(&txn)
        .create(NewBatch {
            company_id: Some(company_id),
            created_by: actor.id,
            original_filename: None,
            total_records: total,
            status: BatchStatus::Pending,
        })
        .await?;
    RecordRepository::new(&txn).insert_many(&batch, records).await?;
    txn.commit().await?;

    tracing::info!(batch_id = %batch.id, %company_id, users = total, "Batch created from users");

    ctx.audit.emit(AuditEvent::batch(
        actor.id,
        batch.id,
        "create_from_users",
        json!({ "user_count": total, "company_id": company_id }),
    ));

    Ok(batch.into())
}

fn dedup_in_order(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Roster fields for a user, preferring the card profile.
///
/// Without a card name the local part of the login email is used, or the
/// whole email when the local part is blank.
fn record_from_user(user: &user::Model) -> NewRecord {
    let local_part = user.email.split('@').next().unwrap_or_default().trim();
    let fallback_name = if local_part.is_empty() {
        user.email.clone()
    } else {
        local_part.to_string()
    };

    NewRecord {
        full_name: non_blank(&user.card_full_name).unwrap_or(fallback_name),
        email: non_blank(&user.card_email).unwrap_or_else(|| user.email.clone()),
        mobile_phone: non_blank(&user.card_mobile_phone),
        job_title: non_blank(&user.card_job_title),
        office_phone: non_blank(&user.card_office_phone),
    }
}
