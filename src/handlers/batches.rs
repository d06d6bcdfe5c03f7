//! # Batches API Handlers
//!
//! Read-only views of batches and their records.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use super::records::ScopeQuery;
use crate::error::ApiError;
use crate::models::batch::BatchRead;
use crate::models::record::RecordRead;
use crate::pipelines;
use crate::server::AppState;
use crate::tenancy::Actor;

/// List batches visible to the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/batches",
    security(("bearer_auth" = [])),
    params(ScopeQuery),
    responses(
        (status = 200, description = "Batches in scope", body = [BatchRead]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Cross-tenant request", body = ApiError)
    ),
    tag = "batches"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ScopeQuery>,
) -> Result<Json<Vec<BatchRead>>, ApiError> {
    let batches = pipelines::list_batches(&state.pipelines, &actor, query.company_id).await?;
    Ok(Json(batches))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch identifier")),
    responses(
        (status = 200, description = "Batch snapshot", body = BatchRead),
        (status = 403, description = "Batch belongs to another company", body = ApiError),
        (status = 404, description = "Batch not found", body = ApiError)
    ),
    tag = "batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchRead>, ApiError> {
    Ok(Json(pipelines::get_batch(&state.pipelines, &actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}/records",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Batch identifier")),
    responses(
        (status = 200, description = "Records of the batch", body = [RecordRead]),
        (status = 403, description = "Batch belongs to another company", body = ApiError),
        (status = 404, description = "Batch not found", body = ApiError)
    ),
    tag = "batches"
)]
pub async fn list_batch_records(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RecordRead>>, ApiError> {
    Ok(Json(
        pipelines::list_batch_records(&state.pipelines, &actor, id).await?,
    ))
}
