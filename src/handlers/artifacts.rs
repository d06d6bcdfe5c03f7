//! # Artifacts API Handlers

use std::io;
use std::pin::pin;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::batch::BatchRead;
use crate::pipelines::ReconcileSession;
use crate::server::AppState;
use crate::tenancy::Actor;

/// Target batch of an artifact upload
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArtifactUploadQuery {
    /// Batch whose records the artifacts belong to
    pub batch_id: Uuid,
    /// Must match the batch's company when supplied
    pub company_id: Option<Uuid>,
}

/// Multipart body of an artifact upload
#[derive(Debug, ToSchema)]
pub struct ArtifactUpload {
    /// One or more `{record_id}.png` files
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
}

/// Upload generated artifacts for the records of a batch
///
/// Every multipart field named `files` is one artifact named `{record_id}.png`.
/// Files that match no record of the batch are skipped.
#[utoipa::path(
    post,
    path = "/api/v1/artifacts/upload",
    security(("bearer_auth" = [])),
    params(ArtifactUploadQuery),
    request_body(content = ArtifactUpload, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Artifacts reconciled", body = BatchRead),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Batch belongs to another company", body = ApiError),
        (status = 404, description = "Batch not found", body = ApiError)
    ),
    tag = "artifacts"
)]
pub async fn upload_artifacts(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ArtifactUploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchRead>), ApiError> {
    let mut session =
        ReconcileSession::begin(&state.pipelines, query.company_id, &actor, query.batch_id).await?;

    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("files" | "file")) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut reader = pin!(StreamReader::new(field.map_err(io::Error::other)));
        session.accept(&filename, &mut reader).await?;
    }

    let batch = session.finish().await?;
    Ok((StatusCode::ACCEPTED, Json(batch)))
}
