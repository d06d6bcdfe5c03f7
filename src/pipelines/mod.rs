//! # Pipelines
//!
//! The roster operations: workbook ingestion, artifact reconciliation, batch
//! synthesis from existing users, single-record creation and the read
//! queries. Every operation resolves its tenant through [`crate::tenancy`]
//! before touching the store and returns a [`BatchRead`] snapshot.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::audit::AuditSink;
use crate::config::{AppConfig, IngestConfig, ReconcileConfig};
use crate::storage::BlobStore;

pub mod ingest;
pub mod queries;
pub mod reconcile;
pub mod single;
pub mod synthesize;

pub use crate::models::batch::BatchRead;
pub use crate::models::record::RecordRead;
pub use ingest::ingest;
pub use queries::{get_batch, list_batch_records, list_batches};
pub use reconcile::{ArtifactFile, ReconcileSession, reconcile};
pub use single::{RecordInput, create_single};
pub use synthesize::synthesize;

/// Collaborators shared by every pipeline
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Arc<DatabaseConnection>,
    pub blobs: Arc<dyn BlobStore>,
    pub audit: Arc<dyn AuditSink>,
    pub ingest: IngestConfig,
    pub reconcile: ReconcileConfig,
}

impl PipelineContext {
    pub fn new(
        config: &AppConfig,
        db: Arc<DatabaseConnection>,
        blobs: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            db,
            blobs,
            audit,
            ingest: config.ingest.clone(),
            reconcile: config.reconcile.clone(),
        }
    }
}
