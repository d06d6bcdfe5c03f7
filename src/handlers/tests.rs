//! # Tests for Handlers
//!
//! This module contains unit tests for API handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Json,
};
use sea_orm::Database;
use tower::ServiceExt;

use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::handlers::{healthz, root};
use crate::server::{AppState, create_app};
use crate::storage::LocalBlobStore;

struct NullSink;

impl AuditSink for NullSink {
    fn emit(&self, _event: crate::audit::AuditEvent) {}
}

async fn sqlite_state() -> AppState {
    let config = Arc::new(AppConfig::default());
    let db = Arc::new(Database::connect("sqlite::memory:").await.unwrap());
    let blobs = Arc::new(LocalBlobStore::new("uploads", 4096));
    AppState::new(config, db, blobs, Arc::new(NullSink))
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "rosters-api");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_healthz_reports_ok_for_live_database() {
    let Json(health) = healthz(State(sqlite_state().await)).await.unwrap();

    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_protected_routes_reject_anonymous_requests() {
    let app = create_app(sqlite_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/batches")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
}
