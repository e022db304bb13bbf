//! HTTP gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/analyze` | Multipart upload (`vcf_file`, `drugs`), returns the analysis JSON |
//! | `GET` | `/api/logs` | Full analysis history |
//! | `DELETE` | `/api/logs` | Clear the history |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "error_type": "VCF_VALIDATION_ERROR", "message": "No VCF file uploaded." }
//! ```
//!
//! `error_type` is one of `VCF_VALIDATION_ERROR` (400), `INPUT_VALIDATION`
//! (400) or `INTERNAL` (500). Internal causes are logged, never returned.
//!
//! Analyze responses carry an `X-Analysis-Source` header (`live`,
//! `cached` or `degraded`). The body itself is passed through untouched.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients on
//! another origin can upload directly.

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pharmaguard_core::models::LogEntry;

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::orchestrator::AnalysisOrchestrator;
use crate::upload::{UploadedFile, MSG_NO_DRUGS, MSG_NO_FILE};

/// Response header naming the provider that answered.
pub const SOURCE_HEADER: &str = "x-analysis-source";

/// Slack above the upload ceiling for multipart framing and text fields.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

const MSG_MALFORMED_UPLOAD: &str = "Uploaded file could not be received.";
const MSG_LOGS_CLEARED: &str = "All analysis logs cleared.";

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AnalysisOrchestrator>,
    /// Where request-scoped upload copies are written. System temp dir when `None`.
    upload_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>, upload_dir: Option<PathBuf>) -> Self {
        Self {
            orchestrator,
            upload_dir,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(AnalysisOrchestrator::from_config(config)?),
            config.upload.dir.clone(),
        ))
    }
}

/// Builds the router with every route and layer attached.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.orchestrator.upload_validator().max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/analyze", post(handle_analyze))
        .route("/api/logs", get(handle_list_logs).delete(handle_clear_logs))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server]` host and port.
///
/// Runs until the process is terminated. Returns an error if the
/// pipeline cannot be built or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let bind_addr = config.server.bind_addr();
    tracing::info!(
        addr = %bind_addr,
        analysis = config.analysis.url.as_deref().unwrap_or("disabled"),
        validator = config.validator.url.as_deref().unwrap_or("disabled"),
        log_path = %config.storage.log_path.display(),
        "pharmaguard listening"
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error_type: &'static str,
    message: String,
}

/// Converts an [`AnalyzeError`] into the JSON error contract.
struct AppError(AnalyzeError);

impl From<AnalyzeError> for AppError {
    fn from(e: AnalyzeError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self(AnalyzeError::Internal(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AnalyzeError::Internal(cause) = &self.0 {
            tracing::error!(error = %format!("{:#}", cause), "request failed");
        }
        let body = ErrorBody {
            success: false,
            error_type: self.0.error_type(),
            message: self.0.public_message(),
        };
        (self.0.status(), Json(body)).into_response()
    }
}

// ============ POST /api/analyze ============

struct AnalyzeForm {
    file: Option<UploadedFile>,
    drugs: Option<String>,
}

/// Streams the multipart body: the file field into a temporary file, the
/// drug list into memory.
///
/// Once the file passes the size ceiling nothing more is read: the held
/// upload already fails validation, and draining the rest of an
/// arbitrarily large body would only run into the transport limit.
async fn read_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<AnalyzeForm, AnalyzeError> {
    let validator = state.orchestrator.upload_validator();
    let mut form = AnalyzeForm {
        file: None,
        drugs: None,
    };

    loop {
        let next = match multipart.next_field().await {
            Ok(next) => next,
            // The held file is validated first so its own problem wins.
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE && form.file.is_some() => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(validator.too_large())
            }
            Err(e) => {
                tracing::info!(error = %e, "malformed multipart body");
                return Err(AnalyzeError::vcf(MSG_MALFORMED_UPLOAD));
            }
        };
        let Some(mut field) = next else {
            break;
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "vcf_file" if form.file.is_none() => {
                let file_name = field.file_name().unwrap_or("").to_string();
                if file_name.is_empty() {
                    continue;
                }
                let mut upload = UploadedFile::create(state.upload_dir.as_deref(), file_name)?;
                let mut oversized = false;
                loop {
                    let chunk = match field.chunk().await {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break,
                        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                            upload.count_dropped(validator.max_bytes().saturating_add(1));
                            oversized = true;
                            break;
                        }
                        Err(e) => {
                            tracing::info!(error = %e, "upload interrupted");
                            return Err(AnalyzeError::vcf(MSG_MALFORMED_UPLOAD));
                        }
                    };
                    if validator.exceeds_limit(upload.size() + chunk.len() as u64) {
                        upload.count_dropped(chunk.len() as u64);
                        oversized = true;
                        break;
                    }
                    upload.append(&chunk).await?;
                }
                upload.finish().await?;
                form.file = Some(upload);
                if oversized {
                    tracing::info!(limit = validator.max_bytes(), "upload over size limit");
                    break;
                }
            }
            "drugs" => {
                let text = field.text().await.map_err(|e| {
                    tracing::info!(error = %e, "unreadable drugs field");
                    AnalyzeError::input(MSG_NO_DRUGS)
                })?;
                form.drugs = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|e| {
        tracing::info!(error = %e, "analyze request without multipart body");
        AnalyzeError::vcf(MSG_NO_FILE)
    })?;

    let form = read_form(&state, multipart).await?;
    let analysis = state
        .orchestrator
        .run(form.file, form.drugs.as_deref())
        .await?;

    Ok((
        [(SOURCE_HEADER, analysis.source.as_str())],
        Json(analysis.body),
    )
        .into_response())
}

// ============ /api/logs ============

#[derive(Serialize)]
struct LogsResponse {
    success: bool,
    logs: Vec<LogEntry>,
    total: usize,
}

#[derive(Serialize)]
struct ClearResponse {
    success: bool,
    message: &'static str,
}

async fn handle_list_logs(State(state): State<AppState>) -> Result<Json<LogsResponse>, AppError> {
    let logs = state.orchestrator.store().list().await?;
    Ok(Json(LogsResponse {
        success: true,
        total: logs.len(),
        logs,
    }))
}

async fn handle_clear_logs(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    state.orchestrator.store().clear().await?;
    tracing::info!("analysis logs cleared");
    Ok(Json(ClearResponse {
        success: true,
        message: MSG_LOGS_CLEARED,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn test_app_error_sanitizes_internal() {
        let response = AppError::from(anyhow::anyhow!("open /secret: denied")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let orch = AnalysisOrchestrator::from_config(&Config::default()).unwrap();
        let app = build_router(AppState::new(Arc::new(orch), None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
