//! HTTP routes: thin JSON dispatch over [`SheetService`].

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use fieldcheck_core::{RefreshReport, SheetService, WarmupStep};
use fieldcheck_shared::{Assignment, FieldcheckError, MatchDiagnostics};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Static front-end served next to the API.
#[derive(Debug, Clone)]
pub(crate) struct StaticFiles {
    pub dir: PathBuf,
    /// File served for `/`.
    pub index_file: String,
}

#[derive(Clone)]
struct AppState {
    service: Arc<SheetService>,
}

/// Build the application router.
pub(crate) fn router(service: Arc<SheetService>, static_files: Option<StaticFiles>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/api/assignments", get(assignments))
        .route("/api/text", get(text))
        .route("/api/refresh-cache", post(refresh_cache))
        .route("/api/debug/connection", get(debug_connection))
        .route("/api/debug/assignments", get(debug_assignments))
        .with_state(AppState { service });

    let app = match static_files {
        Some(files) => api
            .route_service("/", ServeFile::new(files.dir.join(&files.index_file)))
            .fallback_service(ServeDir::new(files.dir)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Handler failure rendered as a JSON body.
#[derive(Debug)]
enum ApiError {
    BadRequest(&'static str),
    Service(FieldcheckError),
}

impl From<FieldcheckError> for ApiError {
    fn from(err: FieldcheckError) -> Self {
        Self::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Service(err) => {
                warn!(error = %err, "request failed");
                let body = json!({
                    "error": err.kind(),
                    "message": err.to_string(),
                    "detail": err.root().to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Trimmed query value, `None` when missing or blank.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
struct AssignmentsQuery {
    fio: Option<String>,
    debug: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssignmentsResponse {
    fio: String,
    items: Vec<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<MatchDiagnostics>,
}

async fn assignments(
    State(state): State<AppState>,
    Query(query): Query<AssignmentsQuery>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let fio = required(query.fio).ok_or(ApiError::BadRequest("fio is required"))?;
    let report = state.service.get_assignments(&fio).await?;

    let with_debug = report.items.is_empty() || query.debug.as_deref() == Some("1");
    Ok(Json(AssignmentsResponse {
        fio: report.fio,
        items: report.items,
        debug: with_debug.then_some(report.diagnostics),
    }))
}

#[derive(Debug, Deserialize)]
struct TextQuery {
    partner: Option<String>,
    method: Option<String>,
}

#[derive(Debug, Serialize)]
struct TextResponse {
    key: String,
    text: String,
    general: String,
    column: Option<String>,
}

async fn text(
    State(state): State<AppState>,
    Query(query): Query<TextQuery>,
) -> Result<Json<TextResponse>, ApiError> {
    let (Some(partner), Some(method)) = (required(query.partner), required(query.method)) else {
        return Err(ApiError::BadRequest("partner and method are required"));
    };
    let lookup = state.service.get_text(&partner, &method).await?;

    Ok(Json(TextResponse {
        text: lookup.effective().to_string(),
        key: lookup.key,
        general: lookup.general,
        column: lookup.column,
    }))
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    status: &'static str,
    message: String,
    timestamp: DateTime<Utc>,
    steps: Vec<WarmupStep>,
}

impl From<RefreshReport> for RefreshResponse {
    fn from(report: RefreshReport) -> Self {
        let (status, message) = match report.first_failure() {
            None => ("success", "cache refreshed".to_string()),
            Some(step) => ("error", format!("cache warm-up failed at {}", step.key)),
        };
        Self {
            status,
            message,
            timestamp: report.timestamp,
            steps: report.steps,
        }
    }
}

async fn refresh_cache(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let report = state.service.refresh_cache().await;
    let code = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(RefreshResponse::from(report)))
}

async fn debug_connection(State(state): State<AppState>) -> Response {
    let report = state.service.debug_connection().await;
    let code = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(report)).into_response()
}

#[derive(Debug, Deserialize)]
struct DebugAssignmentsQuery {
    #[serde(default)]
    fio: String,
}

async fn debug_assignments(
    State(state): State<AppState>,
    Query(query): Query<DebugAssignmentsQuery>,
) -> Result<Response, ApiError> {
    let probe = state.service.debug_assignments(query.fio.trim()).await?;
    Ok(Json(probe).into_response())
}
