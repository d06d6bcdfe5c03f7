//! Integration tests for artifact reconciliation.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;

use rosters::config::CountingMode;
use rosters::error::PipelineError;
use rosters::models::batch::{BatchRead, BatchStatus};
use rosters::models::record::RecordStatus;
use rosters::models::user::Role;
use rosters::pipelines::{self, ArtifactFile, PipelineContext};
use rosters::repositories::{BatchRepository, RecordRepository};
use rosters::tenancy::Actor;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;
use test_utils::{
    RecordingAuditSink, actor, pipeline_context, roster_rows, setup_test_db_arc, workbook_bytes,
};
use uuid::Uuid;

struct Fixture {
    db: Arc<DatabaseConnection>,
    uploads: TempDir,
    ctx: PipelineContext,
    audit: Arc<RecordingAuditSink>,
    admin: Actor,
    company: Uuid,
    batch: BatchRead,
    record_ids: Vec<Uuid>,
}

async fn fixture(records: usize, counting: CountingMode) -> Fixture {
    let db = setup_test_db_arc().await.unwrap();
    let uploads = TempDir::new().unwrap();
    let (ctx, audit) = pipeline_context(db.clone(), uploads.path(), |config| {
        config.reconcile.counting = counting;
    });
    let company = Uuid::new_v4();
    let admin = actor(Role::Administrator, Some(company));

    let bytes = workbook_bytes(&roster_rows(records)).unwrap();
    let batch = pipelines::ingest(&ctx, None, &admin, &mut bytes.as_slice(), "roster.xlsx")
        .await
        .unwrap();
    let record_ids = RecordRepository::new(db.as_ref())
        .find_by_batch(batch.id)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();

    Fixture {
        db,
        uploads,
        ctx,
        audit,
        admin,
        company,
        batch,
        record_ids,
    }
}

fn png(id: Uuid) -> ArtifactFile<&'static [u8]> {
    ArtifactFile::new(format!("{id}.png"), b"\x89PNG fake image".as_slice())
}

#[tokio::test]
async fn test_partial_upload_leaves_batch_processing() {
    let f = fixture(2, CountingMode::PerCall).await;
    let first = f.record_ids[0];

    let files = vec![
        png(first),
        png(Uuid::new_v4()),
        ArtifactFile::new("notes.txt", b"hello".as_slice()),
    ];
    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, files)
        .await
        .unwrap();

    assert_eq!(batch.processed_records, 1);
    assert_eq!(batch.status, BatchStatus::Processing);

    let records = RecordRepository::new(f.db.as_ref())
        .find_by_batch(f.batch.id)
        .await
        .unwrap();
    let matched = records.iter().find(|record| record.id == first).unwrap();
    let expected_path = format!("{}/{}/{first}.png", f.company, f.batch.id);
    assert_eq!(matched.status, RecordStatus::Generated);
    assert_eq!(matched.artifact_filename.as_deref(), Some(expected_path.as_str()));
    assert!(matched.generated_at.is_some());
    assert!(f.uploads.path().join("artifacts").join(&expected_path).exists());

    let untouched = records.iter().find(|record| record.id != first).unwrap();
    assert_eq!(untouched.status, RecordStatus::Pending);
    assert_eq!(untouched.artifact_filename, None);

    let last = f.audit.events().pop().unwrap();
    assert_eq!(last.action, "upload_artifacts");
    assert_eq!(last.details["files"], 1);
}

#[tokio::test]
async fn test_full_upload_completes_batch() {
    let f = fixture(2, CountingMode::PerCall).await;
    let files = f.record_ids.iter().copied().map(png).collect();

    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, files)
        .await
        .unwrap();

    assert_eq!(batch.processed_records, 2);
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_upload_without_matches_resets_to_pending() {
    let f = fixture(2, CountingMode::PerCall).await;

    let batch = pipelines::reconcile(
        &f.ctx,
        None,
        &f.admin,
        f.batch.id,
        vec![ArtifactFile::new("readme.md", b"".as_slice())],
    )
    .await
    .unwrap();

    assert_eq!(batch.processed_records, 0);
    assert_eq!(batch.status, BatchStatus::Pending);
}

#[tokio::test]
async fn test_per_call_counting_overwrites_previous_count() {
    let f = fixture(2, CountingMode::PerCall).await;

    pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(f.record_ids[0])])
        .await
        .unwrap();
    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(f.record_ids[1])])
        .await
        .unwrap();

    assert_eq!(batch.processed_records, 1);
    assert_eq!(batch.status, BatchStatus::Processing);
}

#[tokio::test]
async fn test_cumulative_counting_is_idempotent() {
    let f = fixture(2, CountingMode::Cumulative).await;
    let first = f.record_ids[0];

    for _ in 0..2 {
        let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(first)])
            .await
            .unwrap();
        assert_eq!(batch.processed_records, 1);
        assert_eq!(batch.status, BatchStatus::Processing);
    }

    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(f.record_ids[1])])
        .await
        .unwrap();
    assert_eq!(batch.processed_records, 2);
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_session_accepts_files_one_at_a_time() {
    let f = fixture(1, CountingMode::PerCall).await;
    let id = f.record_ids[0];

    let mut session =
        pipelines::ReconcileSession::begin(&f.ctx, Some(f.company), &f.admin, f.batch.id)
            .await
            .unwrap();

    let in_flight = BatchRepository::new(f.db.as_ref())
        .find_by_id(f.batch.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_flight.status, BatchStatus::Processing);

    assert!(!session.accept("cover.jpg", &mut b"jpg".as_slice()).await.unwrap());
    assert!(session.accept(&format!("{id}.PNG"), &mut b"png".as_slice()).await.unwrap());

    let batch = session.finish().await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_reconcile_enforces_tenant_and_existence() {
    let f = fixture(1, CountingMode::PerCall).await;
    let files = || vec![png(f.record_ids[0])];

    let missing = Uuid::new_v4();
    let err = pipelines::reconcile(&f.ctx, None, &f.admin, missing, files())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, PipelineError::NotFound { entity: "batch", ids } if ids == &vec![missing.to_string()])
    );

    let outsider = actor(Role::Administrator, Some(Uuid::new_v4()));
    let err = pipelines::reconcile(&f.ctx, None, &outsider, f.batch.id, files())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));

    let owner = actor(Role::Owner, None);
    let err = pipelines::reconcile(&f.ctx, Some(Uuid::new_v4()), &owner, f.batch.id, files())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));

    let batch = pipelines::reconcile(&f.ctx, Some(f.company), &owner, f.batch.id, files())
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_error_batch_with_flushed_records_can_be_reconciled() {
    let f = fixture(2, CountingMode::PerCall).await;
    BatchRepository::new(f.db.as_ref())
        .set_status(f.batch.id, BatchStatus::Error)
        .await
        .unwrap();

    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(f.record_ids[0])])
        .await
        .unwrap();

    assert_eq!(batch.processed_records, 1);
    assert_eq!(batch.status, BatchStatus::Processing);
    let records = RecordRepository::new(f.db.as_ref())
        .find_by_batch(f.batch.id)
        .await
        .unwrap();
    let record = records.iter().find(|record| record.id == f.record_ids[0]).unwrap();
    assert_eq!(record.status, RecordStatus::Generated);

    let batch = pipelines::reconcile(&f.ctx, None, &f.admin, f.batch.id, vec![png(f.record_ids[1])])
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Processing);
    assert_eq!(batch.processed_records, 1);
}
