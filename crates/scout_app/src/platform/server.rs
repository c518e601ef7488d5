//! HTTP control surface: start, status, pause, resume and stop.

use std::sync::Arc;

use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use scout_core::{JobSnapshot, Msg};
use scout_engine::{is_valid_sheet_url, JobControl, OrchestratorSettings};
use scout_logging::{scout_info, scout_warn};
use thiserror::Error;
use tokio::sync::Mutex;

use super::jobs::{JobStore, JobStoreError};
use super::launcher::JobLauncher;

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobStore,
    pub launcher: Arc<dyn JobLauncher>,
    pub settings: OrchestratorSettings,
    /// Held from the active-job check until the job is launched, so only one
    /// start request touches the browser at a time.
    start_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        jobs: JobStore,
        launcher: Arc<dyn JobLauncher>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            jobs,
            launcher,
            settings,
            start_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unknown job {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JobStoreError> for ApiError {
    fn from(e: JobStoreError) -> Self {
        ApiError::Conflict(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub sheet_url: String,
}

/// Accepts either a urlencoded form or a JSON body.
impl<S: Send + Sync> FromRequest<S> for StartRequest {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if is_json {
            let Json(body) = Json::<StartRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(body)
        } else {
            let Form(body) = Form::<StartRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(body)
        }
    }
}

#[derive(Serialize)]
struct StartResponse {
    job_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_healthz", get(healthz))
        .route("/start", post(start))
        .route("/status/{job_id}", get(status))
        .route("/pause/{job_id}", post(pause))
        .route("/resume/{job_id}", post(resume))
        .route("/stop/{job_id}", post(stop))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn start(
    State(state): State<AppState>,
    request: StartRequest,
) -> Result<Json<StartResponse>, ApiError> {
    let sheet_url = request.sheet_url.trim().to_string();
    if !is_valid_sheet_url(&sheet_url) {
        return Err(ApiError::BadRequest(
            "sheet_url must be a Google Sheets link".to_string(),
        ));
    }
    let _starting = state.start_lock.lock().await;
    if let Some(active) = state.jobs.active() {
        return Err(JobStoreError::Busy(active.job_id()).into());
    }

    if let Err(e) = state.launcher.check_access(&sheet_url).await {
        scout_warn!("Access check for {} failed: {}", sheet_url, e);
        return Err(ApiError::BadRequest(e.to_string()));
    }

    let settings = state.settings.clone();
    let job = state.jobs.create(|id| settings.new_job(id))?;
    let job_id = job.job_id();
    if let Err(e) = state.launcher.launch(&sheet_url, job.clone()).await {
        job.apply(Msg::Failed {
            message: e.to_string(),
        });
        return Err(ApiError::Internal(e.to_string()));
    }
    scout_info!("Started job {}", job_id);
    Ok(Json(StartResponse { job_id }))
}

async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    Ok(Json(find(&state, &job_id)?.snapshot()))
}

async fn pause(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    find(&state, &job_id)?.pause();
    Ok(StatusCode::NO_CONTENT)
}

async fn resume(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    find(&state, &job_id)?.resume();
    Ok(StatusCode::NO_CONTENT)
}

async fn stop(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    find(&state, &job_id)?.stop();
    Ok(StatusCode::NO_CONTENT)
}

fn find(state: &AppState, job_id: &str) -> Result<JobControl, ApiError> {
    state
        .jobs
        .get(job_id)
        .ok_or_else(|| ApiError::NotFound(job_id.to_string()))
}
