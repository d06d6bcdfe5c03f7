//! Artifact reconciliation: match uploaded per-record files to the records
//! of a batch by the UUID in their file name.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;
use serde_json::json;
use tokio::io::AsyncRead;
use tracing::instrument;
use uuid::Uuid;

use super::PipelineContext;
use crate::audit::AuditEvent;
use crate::config::CountingMode;
use crate::error::PipelineError;
use crate::models::batch::{self, BatchRead, BatchStatus};
use crate::repositories::{BatchRepository, RecordRepository};
use crate::state::reconciled_status;
use crate::storage::{BlobKey, Namespace, base_name};
use crate::telemetry::{ARTIFACTS_MATCHED_TOTAL, ARTIFACTS_SKIPPED_TOTAL};
use crate::tenancy::{Actor, TenantId, authorize_resource};

/// One uploaded artifact
pub struct ArtifactFile<R> {
    pub filename: String,
    pub body: R,
}

impl<R> ArtifactFile<R> {
    pub fn new(filename: impl Into<String>, body: R) -> Self {
        Self {
            filename: filename.into(),
            body,
        }
    }
}

/// Record id encoded in an artifact file name such as `{uuid}.png`.
///
/// Returns `None` for other extensions and for stems that are not UUIDs.
pub fn artifact_record_id(filename: &str, extension: &str) -> Option<Uuid> {
    let name = base_name(filename)?;
    let (stem, ext) = name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    Uuid::parse_str(stem).ok()
}

/// Reconcile a list of artifacts against a batch in one call
pub async fn reconcile<R>(
    ctx: &PipelineContext,
    tenant_scope: Option<TenantId>,
    actor: &Actor,
    batch_id: Uuid,
    files: Vec<ArtifactFile<R>>,
) -> Result<BatchRead, PipelineError>
where
    R: AsyncRead + Send + Unpin,
{
    let mut session = ReconcileSession::begin(ctx, tenant_scope, actor, batch_id).await?;
    for mut file in files {
        session.accept(&file.filename, &mut file.body).await?;
    }
    session.finish().await
}

/// File-by-file reconciliation of one batch.
///
/// `begin` marks the batch `processing` whatever its prior status, including
/// an `error` batch that kept some flushed records. Only `finish` recomputes
/// its counters, so a session abandoned halfway never reports `completed`.
pub struct ReconcileSession<'a> {
    ctx: &'a PipelineContext,
    actor: Actor,
    batch: batch::Model,
    record_ids: HashSet<Uuid>,
    started_at: DateTime<FixedOffset>,
    matched: HashSet<Uuid>,
    stored: u64,
    skipped: u64,
}

impl<'a> ReconcileSession<'a> {
    #[instrument(skip(ctx, actor), fields(actor_id = %actor.id))]
    pub async fn begin(
        ctx: &'a PipelineContext,
        tenant_scope: Option<TenantId>,
        actor: &Actor,
        batch_id: Uuid,
    ) -> Result<Self, PipelineError> {
        let batches = BatchRepository::new(ctx.db.as_ref());
        let batch = batches
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("batch", batch_id))?;

        authorize_resource(actor, batch.company_id)?;
        if let Some(scope) = tenant_scope
            && batch.company_id != Some(scope)
        {
            return Err(PipelineError::forbidden("company_id does not match batch"));
        }

        let record_ids = RecordRepository::new(ctx.db.as_ref())
            .ids_for_batch(batch.id)
            .await?;
        batches.set_status(batch.id, BatchStatus::Processing).await?;

        tracing::info!(
            batch_id = %batch.id,
            records = record_ids.len(),
            "Reconciliation started"
        );

        Ok(Self {
            ctx,
            actor: *actor,
            batch,
            record_ids,
            started_at: Utc::now().fixed_offset(),
            matched: HashSet::new(),
            stored: 0,
            skipped: 0,
        })
    }

    /// Store `reader` as the artifact of the record named by `filename`.
    ///
    /// Returns `false` when the file was skipped: wrong extension, a stem
    /// that is not a UUID, or no such record in the batch.
    pub async fn accept<R>(&mut self, filename: &str, reader: &mut R) -> Result<bool, PipelineError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let record_id = artifact_record_id(filename, &self.ctx.reconcile.artifact_extension)
            .filter(|id| self.record_ids.contains(id));
        let Some(record_id) = record_id else {
            tracing::debug!(batch_id = %self.batch.id, filename, "Skipping artifact");
            counter!(ARTIFACTS_SKIPPED_TOTAL).increment(1);
            self.skipped += 1;
            return Ok(false);
        };

        let key = BlobKey::new(
            Namespace::Artifacts,
            self.batch.company_id,
            self.batch.id,
            filename,
        )?;
        self.ctx.blobs.put_stream(&key, reader).await?;
        RecordRepository::new(self.ctx.db.as_ref())
            .attach_artifact(record_id, &key.relative_path(), self.started_at)
            .await?;

        counter!(ARTIFACTS_MATCHED_TOTAL).increment(1);
        self.matched.insert(record_id);
        self.stored += 1;
        Ok(true)
    }

    /// Recompute the batch counters and status
    pub async fn finish(self) -> Result<BatchRead, PipelineError> {
        let processed = match self.ctx.reconcile.counting {
            CountingMode::PerCall => self.matched.len() as u64,
            CountingMode::Cumulative => {
                RecordRepository::new(self.ctx.db.as_ref())
                    .count_generated(self.batch.id)
                    .await?
            }
        };
        let processed = i32::try_from(processed).unwrap_or(i32::MAX);
        let status = reconciled_status(processed, self.batch.total_records);

        let updated = BatchRepository::new(self.ctx.db.as_ref())
            .update_progress(self.batch.id, None, processed, status)
            .await?;

        tracing::info!(
            batch_id = %updated.id,
            stored = self.stored,
            skipped = self.skipped,
            processed,
            status = updated.status.as_str(),
            "Reconciliation finished"
        );

        self.ctx.audit.emit(AuditEvent::batch(
            self.actor.id,
            updated.id,
            "upload_artifacts",
            json!({ "files": self.stored }),
        ));

        Ok(updated.into())
    }
}
