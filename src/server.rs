//! # Server Configuration
//!
//! This module contains the server setup and configuration for the Rosters API.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::audit::{AuditSink, DbAuditSink};
use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers::{self, artifacts, batches, records};
use crate::pipelines::PipelineContext;
use crate::storage::{BlobStore, LocalBlobStore};
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub pipelines: Arc<PipelineContext>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        blobs: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let pipelines = Arc::new(PipelineContext::new(&config, Arc::clone(&db), blobs, audit));
        Self {
            config,
            db,
            pipelines,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    // Uploads are streamed to disk, so the default 2 MB body cap does not apply.
    let api = Router::new()
        .route("/records", post(records::create_record))
        .route("/records/upload-xlsx", post(records::upload_xlsx))
        .route("/records/from-users", post(records::create_from_users))
        .route("/artifacts/upload", post(artifacts::upload_artifacts))
        .route("/batches", get(batches::list_batches))
        .route("/batches/{id}", get(batches::get_batch))
        .route("/batches/{id}/records", get(batches::list_batch_records))
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let config = Arc::new(config);
    let db = Arc::new(db);
    let blobs = Arc::new(LocalBlobStore::new(
        config.upload_dir.clone(),
        config.ingest.upload_chunk_bytes,
    ));
    let audit = Arc::new(DbAuditSink::new(Arc::clone(&db)));
    let app = create_app(AppState::new(Arc::clone(&config), db, blobs, audit));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Registers the bearer JWT scheme referenced by the protected routes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::records::create_record,
        crate::handlers::records::upload_xlsx,
        crate::handlers::records::create_from_users,
        crate::handlers::artifacts::upload_artifacts,
        crate::handlers::batches::list_batches,
        crate::handlers::batches::get_batch,
        crate::handlers::batches::list_batch_records,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthStatus,
            crate::error::ApiError,
            crate::models::batch::BatchRead,
            crate::models::batch::BatchStatus,
            crate::models::record::RecordRead,
            crate::models::record::RecordStatus,
            crate::pipelines::RecordInput,
            crate::handlers::records::FromUsersRequest,
            crate::handlers::records::WorkbookUpload,
            crate::handlers::artifacts::ArtifactUpload,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "records", description = "Roster ingestion"),
        (name = "artifacts", description = "Per-record artifact uploads"),
        (name = "batches", description = "Batch and record queries")
    ),
    info(
        title = "Rosters API",
        description = "API for roster ingestion and artifact reconciliation",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
