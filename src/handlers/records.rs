//! # Records API Handlers
//!
//! Typed single-record creation, workbook upload and batch synthesis from
//! existing users.

use std::io;
use std::pin::pin;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::StreamReader;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, validation_error};
use crate::models::batch::BatchRead;
use crate::models::record::RecordRead;
use crate::pipelines::{self, RecordInput};
use crate::server::AppState;
use crate::tenancy::Actor;

/// Optional tenant override; only owners may name another company
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScopeQuery {
    /// Company that owns the created batch
    pub company_id: Option<Uuid>,
}

/// Request payload for creating a batch from existing users
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct FromUsersRequest {
    /// Company that owns the batch; owners must supply it
    pub company_id: Option<Uuid>,
    /// Users to include, duplicates are ignored
    pub user_ids: Vec<Uuid>,
}

/// Multipart body of a workbook upload
#[derive(Debug, ToSchema)]
pub struct WorkbookUpload {
    /// The `.xlsx` workbook
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Create a single record in a one-record batch
#[utoipa::path(
    post,
    path = "/api/v1/records",
    security(("bearer_auth" = [])),
    params(ScopeQuery),
    request_body = RecordInput,
    responses(
        (status = 201, description = "Record created", body = RecordRead),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Cross-tenant request", body = ApiError)
    ),
    tag = "records"
)]
pub async fn create_record(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ScopeQuery>,
    Json(input): Json<RecordInput>,
) -> Result<(StatusCode, Json<RecordRead>), ApiError> {
    let record = pipelines::create_single(&state.pipelines, query.company_id, &actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Upload an `.xlsx` roster as a new batch
///
/// The workbook is streamed from the multipart field `file`.
#[utoipa::path(
    post,
    path = "/api/v1/records/upload-xlsx",
    security(("bearer_auth" = [])),
    params(ScopeQuery),
    request_body(content = WorkbookUpload, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Workbook ingested", body = BatchRead),
        (status = 400, description = "Not an .xlsx file or the workbook could not be parsed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Cross-tenant request", body = ApiError)
    ),
    tag = "records"
)]
pub async fn upload_xlsx(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ScopeQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchRead>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut reader = pin!(StreamReader::new(field.map_err(io::Error::other)));
        let batch =
            pipelines::ingest(&state.pipelines, query.company_id, &actor, &mut reader, &filename)
                .await?;
        return Ok((StatusCode::ACCEPTED, Json(batch)));
    }

    Err(validation_error(
        "Missing workbook",
        json!({ "file": "A multipart field named 'file' is required" }),
    ))
}

/// Create a batch with one record per existing user
#[utoipa::path(
    post,
    path = "/api/v1/records/from-users",
    security(("bearer_auth" = [])),
    request_body = FromUsersRequest,
    responses(
        (status = 201, description = "Batch created", body = BatchRead),
        (status = 400, description = "Empty user list or no company resolved", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "Some users were not found in the company", body = ApiError)
    ),
    tag = "records"
)]
pub async fn create_from_users(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<FromUsersRequest>,
) -> Result<(StatusCode, Json<BatchRead>), ApiError> {
    let batch =
        pipelines::synthesize(&state.pipelines, request.company_id, &actor, &request.user_ids)
            .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}
