//! Workbook ingestion.
//!
//! The upload is persisted to the `sources` namespace, then parsed on a
//! blocking worker. Accepted rows cross a bounded channel to the async side
//! where they are written in flush units of `ingest.flush_size` rows.

use std::path::PathBuf;

use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde_json::json;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::instrument;

use super::PipelineContext;
use crate::audit::AuditEvent;
use crate::config::CommitMode;
use crate::error::PipelineError;
use crate::models::batch::{self, BatchRead, BatchStatus};
use crate::repositories::{BatchRepository, NewBatch, NewRecord, RecordRepository};
use crate::rows::{RowCandidate, RowValidator, ValidatorError, XlsxRowSource};
use crate::storage::{BlobKey, Namespace, base_name};
use crate::telemetry::{self, ROWS_ACCEPTED_TOTAL, ROWS_REJECTED_TOTAL};
use crate::tenancy::{Actor, TenantId, resolve_scope};

const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Row counts reported by the parser once the workbook is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowTally {
    accepted: u64,
    rejected: u64,
}

/// Message from the parser to the flusher
enum Parsed {
    Row(RowCandidate),
    /// The sheet was read to the end; rows still buffered may be written
    Done,
}

/// Ingest the workbook read from `source` into a new batch.
///
/// The batch exists in `processing` status from the moment the scope is
/// resolved. It ends `pending` with `total_records` set to the number of
/// accepted rows, or `error` when storing or parsing the upload fails. A
/// dropped future also leaves the batch in `error`.
#[instrument(
    skip(ctx, actor, source),
    fields(actor_id = %actor.id, filename = %original_filename)
)]
pub async fn ingest<R>(
    ctx: &PipelineContext,
    tenant_scope: Option<TenantId>,
    actor: &Actor,
    source: &mut R,
    original_filename: &str,
) -> Result<BatchRead, PipelineError>
where
    R: AsyncRead + Send + Unpin,
{
    let filename = workbook_name(original_filename)?;
    let scope = resolve_scope(actor, tenant_scope)?;

    let batches = BatchRepository::new(ctx.db.as_ref());
    let batch = batches
        .create(NewBatch {
            company_id: scope,
            created_by: actor.id,
            original_filename: Some(filename.to_string()),
            total_records: 0,
            status: BatchStatus::Processing,
        })
        .await?;

    let guard = scopeguard::guard((ctx.db.clone(), batch.id), |(db, batch_id)| {
        tracing::warn!(%batch_id, "Ingestion interrupted, marking batch as error");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = BatchRepository::new(db.as_ref())
                    .set_status(batch_id, BatchStatus::Error)
                    .await
                {
                    tracing::error!(%batch_id, error = %err, "Failed to mark interrupted batch");
                }
            });
        }
    });

    let tally = match load_rows(ctx, &batch, filename, source).await {
        Ok(tally) => tally,
        Err(err) => {
            tracing::warn!(batch_id = %batch.id, error = %err, "Ingestion failed");
            telemetry::record_pipeline_failure("ingest", failure_kind(&err));
            batches.set_status(batch.id, BatchStatus::Error).await?;
            let _ = scopeguard::ScopeGuard::into_inner(guard);
            return Err(PipelineError::Parse(err.to_string()));
        }
    };

    let total = i32::try_from(tally.accepted)
        .map_err(|_| PipelineError::InvalidInput("workbook has too many rows".to_string()))?;
    let finished = batches
        .update_progress(batch.id, Some(total), 0, BatchStatus::Pending)
        .await?;
    let _ = scopeguard::ScopeGuard::into_inner(guard);

    counter!(ROWS_ACCEPTED_TOTAL).increment(tally.accepted);
    counter!(ROWS_REJECTED_TOTAL).increment(tally.rejected);
    tracing::info!(
        batch_id = %finished.id,
        accepted = tally.accepted,
        rejected = tally.rejected,
        "Workbook ingested"
    );

    ctx.audit.emit(AuditEvent::batch(
        actor.id,
        finished.id,
        "ingest",
        json!({ "filename": filename, "records": tally.accepted }),
    ));

    Ok(finished.into())
}

/// Base name of an accepted workbook upload
fn workbook_name(original_filename: &str) -> Result<&str, PipelineError> {
    let name = base_name(original_filename)
        .ok_or_else(|| PipelineError::InvalidInput("a file name is required".to_string()))?;
    if !name.to_ascii_lowercase().ends_with(WORKBOOK_EXTENSION) {
        return Err(PipelineError::InvalidInput(format!(
            "only {WORKBOOK_EXTENSION} workbooks are accepted, got {name:?}"
        )));
    }
    Ok(name)
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Validator(#[from] ValidatorError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("row parser stopped unexpectedly: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<crate::storage::StorageError> for LoadError {
    fn from(err: crate::storage::StorageError) -> Self {
        Self::Pipeline(err.into())
    }
}

fn failure_kind(err: &LoadError) -> &'static str {
    match err {
        LoadError::Validator(ValidatorError::HeaderNotFound { .. }) => "header_not_found",
        LoadError::Validator(ValidatorError::Source(_)) => "source",
        LoadError::Pipeline(PipelineError::Storage(_)) => "storage",
        LoadError::Pipeline(_) => "database",
        LoadError::Worker(_) => "worker",
    }
}

/// Store the upload, then parse and flush its rows
async fn load_rows<R>(
    ctx: &PipelineContext,
    batch: &batch::Model,
    filename: &str,
    source: &mut R,
) -> Result<RowTally, LoadError>
where
    R: AsyncRead + Send + Unpin,
{
    let key = BlobKey::new(Namespace::Sources, batch.company_id, batch.id, filename)?;
    let bytes = ctx.blobs.put_stream(&key, source).await?;
    tracing::debug!(batch_id = %batch.id, key = %key, bytes, "Stored source workbook");

    let flush_size = ctx.ingest.flush_size.max(1);
    let path = ctx.blobs.local_path(&key);

    match ctx.ingest.commit_mode {
        CommitMode::PerChunk => {
            let (tx, mut rx) = mpsc::channel(flush_size);
            let parser = tokio::task::spawn_blocking(move || parse_workbook(path, tx));
            let target = FlushTarget::PerChunk(ctx.db.as_ref());
            let flushed = drain(target, batch, &mut rx, flush_size).await;
            // Closing the receiver unblocks a parser still waiting on a full channel.
            drop(rx);
            settle(flushed, parser.await)
        }
        CommitMode::Atomic => {
            let txn = ctx.db.begin().await.map_err(PipelineError::from)?;
            let (tx, mut rx) = mpsc::channel(flush_size);
            let parser = tokio::task::spawn_blocking(move || parse_workbook(path, tx));
            let flushed = drain(FlushTarget::Staged(&txn), batch, &mut rx, flush_size).await;
            drop(rx);

            match settle(flushed, parser.await) {
                Ok(tally) => {
                    txn.commit().await.map_err(PipelineError::from)?;
                    Ok(tally)
                }
                Err(err) => {
                    txn.rollback().await.map_err(PipelineError::from)?;
                    Err(err)
                }
            }
        }
    }
}

/// Combine the flusher and parser outcomes, parser panics first
fn settle(
    flushed: Result<u64, PipelineError>,
    parsed: Result<Result<RowTally, ValidatorError>, tokio::task::JoinError>,
) -> Result<RowTally, LoadError> {
    let parsed = parsed?;
    let written = flushed?;
    let tally = parsed?;
    debug_assert_eq!(written, tally.accepted);
    Ok(tally)
}

/// Blocking half: validate rows and hand accepted ones to the flusher.
///
/// `Done` is only sent after the last row parsed cleanly, so a sheet that
/// breaks partway never has its buffered tail written.
fn parse_workbook(path: PathBuf, tx: mpsc::Sender<Parsed>) -> Result<RowTally, ValidatorError> {
    XlsxRowSource::scan(&path, |source| -> Result<RowTally, ValidatorError> {
        let mut validator = RowValidator::new(source)?;
        while let Some(row) = validator.next_candidate()? {
            if tx.blocking_send(Parsed::Row(row)).is_err() {
                break;
            }
        }
        // A closed channel means the flusher already failed.
        let _ = tx.blocking_send(Parsed::Done);
        Ok(RowTally {
            accepted: validator.accepted(),
            rejected: validator.rejected(),
        })
    })?
}

enum FlushTarget<'a> {
    /// Each flush unit commits in its own transaction
    PerChunk(&'a DatabaseConnection),
    /// Every flush unit joins one outer transaction
    Staged(&'a DatabaseTransaction),
}

impl FlushTarget<'_> {
    async fn flush(
        &self,
        batch: &batch::Model,
        rows: Vec<NewRecord>,
    ) -> Result<u64, PipelineError> {
        match self {
            FlushTarget::PerChunk(db) => {
                let txn = db.begin().await?;
                let written = RecordRepository::new(&txn).insert_many(batch, rows).await?;
                txn.commit().await?;
                Ok(written)
            }
            FlushTarget::Staged(txn) => {
                Ok(RecordRepository::new(*txn).insert_many(batch, rows).await?)
            }
        }
    }
}

/// Buffer rows from the channel and flush them strictly in sequence.
///
/// The partial unit left at the end is written only once the parser reports
/// `Done`; otherwise it is discarded.
async fn drain(
    target: FlushTarget<'_>,
    batch: &batch::Model,
    rx: &mut mpsc::Receiver<Parsed>,
    flush_size: usize,
) -> Result<u64, PipelineError> {
    let mut buffer = Vec::with_capacity(flush_size);
    let mut written = 0u64;

    while let Some(message) = rx.recv().await {
        let row = match message {
            Parsed::Row(row) => row,
            Parsed::Done => {
                if !buffer.is_empty() {
                    written += target.flush(batch, buffer).await?;
                }
                return Ok(written);
            }
        };
        buffer.push(NewRecord::from(row));
        if buffer.len() >= flush_size {
            let unit = std::mem::replace(&mut buffer, Vec::with_capacity(flush_size));
            written += target.flush(batch, unit).await?;
            tracing::debug!(batch_id = %batch.id, written, "Flushed rows");
        }
    }

    if !buffer.is_empty() {
        tracing::debug!(
            batch_id = %batch.id,
            discarded = buffer.len(),
            "Parser stopped early, discarding buffered rows"
        );
    }
    Ok(written)
}
