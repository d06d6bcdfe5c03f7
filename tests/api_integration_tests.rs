//! End-to-end tests of the HTTP surface against an in-memory database

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rosters::auth::Claims;
use rosters::config::AppConfig;
use rosters::models::user::Role;
use rosters::server::{AppState, create_app};
use rosters::storage::LocalBlobStore;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{
    RecordingAuditSink, insert_company, insert_user, roster_rows, setup_test_db_arc,
    workbook_bytes,
};

const SECRET: &str = "api-test-secret";
const BOUNDARY: &str = "rosters-test-boundary";

struct TestApi {
    app: Router,
    token: String,
    company: Uuid,
    audit: Arc<RecordingAuditSink>,
    _uploads: TempDir,
}

async fn test_api() -> TestApi {
    let db = setup_test_db_arc().await.unwrap();
    let uploads = TempDir::new().unwrap();
    let company = insert_company(&db, "Acme").await.unwrap();
    insert_user(&db, "admin@acme.test", Role::Administrator, Some(company))
        .await
        .unwrap();

    let config = AppConfig {
        profile: "test".to_string(),
        jwt_secret: Some(SECRET.to_string()),
        upload_dir: uploads.path().to_path_buf(),
        ..AppConfig::default()
    };
    let blobs = Arc::new(LocalBlobStore::new(
        config.upload_dir.clone(),
        config.ingest.upload_chunk_bytes,
    ));
    let audit = Arc::new(RecordingAuditSink::default());
    let app = create_app(AppState::new(Arc::new(config), db, blobs, audit.clone()));

    let claims = Claims {
        sub: "admin@acme.test".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    TestApi {
        app,
        token,
        company,
        audit,
        _uploads: uploads,
    }
}

/// `multipart/form-data` body with one file part per `(field, filename, bytes)`
fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApi {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    fn request(&self, method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(self.request(Method::GET, uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, payload: Value) -> Response {
        self.send(
            self.request(Method::POST, uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn post_multipart(&self, uri: &str, parts: &[(&str, &str, &[u8])]) -> Response {
        self.send(
            self.request(Method::POST, uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_workbook_upload_then_artifacts_complete_the_batch() {
    let api = test_api().await;
    let workbook = workbook_bytes(&roster_rows(3)).unwrap();

    let response = api
        .post_multipart(
            "/api/v1/records/upload-xlsx",
            &[("file", "roster.xlsx", workbook.as_slice())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let batch = json_body(response).await;
    assert_eq!(batch["total_records"], 3);
    assert_eq!(batch["processed_records"], 0);
    assert_eq!(batch["status"], "pending");
    assert_eq!(batch["original_filename"], "roster.xlsx");
    let batch_id = batch["id"].as_str().unwrap().to_string();

    let response = api.get(&format!("/api/v1/batches/{batch_id}/records")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let records = json_body(response).await;
    let ids: Vec<String> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 3);

    let names: Vec<String> = ids.iter().map(|id| format!("{id}.png")).collect();
    let parts: Vec<(&str, &str, &[u8])> = names
        .iter()
        .map(|name| ("files", name.as_str(), b"png-bytes".as_slice()))
        .chain([("files", "thumbs.db", b"junk".as_slice())])
        .collect();
    let response = api
        .post_multipart(&format!("/api/v1/artifacts/upload?batch_id={batch_id}"), &parts)
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let batch = json_body(response).await;
    assert_eq!(batch["processed_records"], 3);
    assert_eq!(batch["status"], "completed");

    let response = api.get(&format!("/api/v1/batches/{batch_id}")).await;
    assert_eq!(json_body(response).await["status"], "completed");

    let records = json_body(api.get(&format!("/api/v1/batches/{batch_id}/records")).await).await;
    assert!(
        records
            .as_array()
            .unwrap()
            .iter()
            .all(|record| record["status"] == "generated")
    );

    let actions: Vec<&str> = api.audit.events().iter().map(|event| event.action).collect();
    assert_eq!(actions, vec!["ingest", "upload_artifacts"]);
}

#[tokio::test]
async fn test_upload_rejections() {
    let api = test_api().await;

    let response = api
        .post_multipart(
            "/api/v1/records/upload-xlsx",
            &[("attachment", "roster.xlsx", b"bytes".as_slice())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");

    let response = api
        .post_multipart(
            "/api/v1/records/upload-xlsx",
            &[("file", "roster.csv", b"a,b,c".as_slice())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = api
        .post_multipart(
            "/api/v1/records/upload-xlsx",
            &[("file", "roster.xlsx", b"not a workbook".as_slice())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "PARSE_ERROR");

    let response = api
        .post_multipart(
            &format!("/api/v1/artifacts/upload?batch_id={}", Uuid::new_v4()),
            &[("files", "x.png", b"png".as_slice())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_typed_record_and_user_synthesis() {
    let api = test_api().await;

    let response = api
        .post_json(
            "/api/v1/records",
            json!({ "full_name": "Ana Ruiz", "email": "ana@example.com", "job_title": "Gerente" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = json_body(response).await;
    assert_eq!(record["status"], "pending");
    assert_eq!(record["job_title"], "Gerente");

    let response = api
        .post_json(
            "/api/v1/records",
            json!({ "full_name": "Ana Ruiz", "email": "   " }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing = Uuid::new_v4();
    let response = api
        .post_json(
            "/api/v1/records/from-users",
            json!({ "user_ids": [missing] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let problem = json_body(response).await;
    assert_eq!(problem["details"]["ids"][0], missing.to_string());

    let response = api
        .post_json(
            "/api/v1/records/from-users",
            json!({ "company_id": api.company, "user_ids": [] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let batches = json_body(api.get("/api/v1/batches").await).await;
    assert_eq!(batches.as_array().unwrap().len(), 1);
}
