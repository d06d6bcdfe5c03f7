//! # Error Handling
//!
//! This module provides unified error handling for the Rosters API: the
//! core [`PipelineError`] returned by every pipeline, the repository-level
//! [`RepositoryError`], and the problem+json [`ApiError`] the HTTP layer
//! renders, with trace ID propagation.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::storage::StorageError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    pub retry_after: Option<u64>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Extract current trace ID from the active tracing span (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

fn is_unique_violation(error: &DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after
            && let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string())
        {
            headers.insert("retry-after", header_value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

// Error mappers for common sources

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        tracing::debug!(%error, "Malformed multipart body");
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            &format!("Invalid multipart body: {}", error.body_text()),
        )
    }
}

impl From<DbErr> for ApiError {
    fn from(error: DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
                .with_retry_after(5)
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

/// Errors raised by the repository layer
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("not found: {0}")]
    NotFound(String),
}

impl RepositoryError {
    /// Adapter for `map_err` on SeaORM calls
    pub fn database_error(error: DbErr) -> Self {
        Self::Database(error)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// Errors surfaced by the ingestion, reconciliation and synthesis pipelines
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The actor may not act on the requested scope or resource
    #[error("{0}")]
    Forbidden(String),
    /// A tenant-scoped actor has no company assigned
    #[error("user is not assigned to a company")]
    ScopeRequired,
    /// The operation needs a concrete tenant but none was resolved
    #[error("company_id is required for a global batch")]
    TenantRequired,
    #[error("{entity} not found: {}", .ids.join(", "))]
    NotFound { entity: &'static str, ids: Vec<String> },
    #[error("{0}")]
    InvalidInput(String),
    /// The uploaded source could not be parsed
    #[error("could not parse upload: {0}")]
    Parse(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl PipelineError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            ids: vec![id.to_string()],
        }
    }
}

impl From<RepositoryError> for PipelineError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(err) => Self::Database(err),
            RepositoryError::NotFound(what) => Self::NotFound {
                entity: "resource",
                ids: vec![what],
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let message = error.to_string();
        match error {
            PipelineError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", &message),
            PipelineError::ScopeRequired => {
                Self::new(StatusCode::BAD_REQUEST, "SCOPE_REQUIRED", &message)
            }
            PipelineError::TenantRequired => {
                Self::new(StatusCode::BAD_REQUEST, "TENANT_REQUIRED", &message)
            }
            PipelineError::InvalidInput(_) => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
            }
            PipelineError::Parse(_) => Self::new(StatusCode::BAD_REQUEST, "PARSE_ERROR", &message),
            PipelineError::NotFound { entity, ids } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", &message)
                    .with_details(json!({ "entity": entity, "ids": ids }))
            }
            PipelineError::Conflict(_) => Self::new(StatusCode::CONFLICT, "CONFLICT", &message),
            PipelineError::Storage(err) => {
                tracing::error!(error = %err, "Blob storage failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "File storage failed",
                )
            }
            PipelineError::Database(err) => err.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        PipelineError::from(error).into()
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}
