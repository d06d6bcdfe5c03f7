//! Telemetry utilities: global subscriber setup, request-scoped trace ids, and
//! the pipeline metric names.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use log::LevelFilter;
use metrics::{Unit, counter, describe_counter};
use thiserror::Error;
use tokio::task_local;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};
use uuid::Uuid;

use crate::config::AppConfig;

/// Header carrying the request correlation id in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const ROWS_ACCEPTED_TOTAL: &str = "rosters_rows_accepted_total";
pub const ROWS_REJECTED_TOTAL: &str = "rosters_rows_rejected_total";
pub const ARTIFACTS_MATCHED_TOTAL: &str = "rosters_artifacts_matched_total";
pub const ARTIFACTS_SKIPPED_TOTAL: &str = "rosters_artifacts_skipped_total";
pub const PIPELINE_FAILURES_TOTAL: &str = "rosters_pipeline_failures_total";
pub const AUDIT_FAILURES_TOTAL: &str = "rosters_audit_failures_total";

/// Trace context containing request correlation ID.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing/logging exactly once, wiring `log::` macros into the tracing pipeline.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    // sqlx and calamine log through `log`
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: Failed to install log tracer bridge: {}. legacy `log::` macros will not emit structured tracing events.",
                err
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: Failed to set global tracing subscriber: {}. Default subscriber remains in effect.",
            err
        );
    }

    describe_metrics();

    Ok(())
}

/// Register descriptions for every counter the pipelines emit
pub fn describe_metrics() {
    describe_counter!(
        ROWS_ACCEPTED_TOTAL,
        Unit::Count,
        "Spreadsheet rows accepted by the validator"
    );
    describe_counter!(
        ROWS_REJECTED_TOTAL,
        Unit::Count,
        "Spreadsheet rows silently skipped by the validator"
    );
    describe_counter!(
        ARTIFACTS_MATCHED_TOTAL,
        Unit::Count,
        "Uploaded artifacts attached to a record"
    );
    describe_counter!(
        ARTIFACTS_SKIPPED_TOTAL,
        Unit::Count,
        "Uploaded artifacts ignored during reconciliation"
    );
    describe_counter!(
        PIPELINE_FAILURES_TOTAL,
        Unit::Count,
        "Pipeline invocations that ended in an error"
    );
    describe_counter!(
        AUDIT_FAILURES_TOTAL,
        Unit::Count,
        "Audit events that could not be written"
    );
}

/// Count a failed pipeline run, labelled by pipeline and error kind
pub fn record_pipeline_failure(pipeline: &'static str, kind: &'static str) {
    counter!(PIPELINE_FAILURES_TOTAL, "pipeline" => pipeline, "kind" => kind).increment(1);
}

/// Execute `future` within the provided trace context, making it available through task-local
/// storage for the duration of the request.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_TRACE_CONTEXT.scope(context, future).await
}

/// Get the currently active trace ID, if one has been set for the running task.
pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

/// Middleware that adopts the caller's `x-request-id` (or mints one), exposes
/// it to handlers and error responses, and echoes it back.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let context = TraceContext {
        trace_id: trace_id.clone(),
    };
    request.extensions_mut().insert(context.clone());

    let mut response = with_trace_context(context, next.run(request)).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
