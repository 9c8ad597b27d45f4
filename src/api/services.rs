use axum::{
    Form, Json,
    body::Body,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_util::io::ReaderStream;

use super::{
    models::{HealthResponse, NO_CACHE, StatusQuery, SubmitForm},
    state::AppState,
    utils::content_type_for,
};
use crate::api::error::ApiError;
use crate::jobs::JobSnapshot;
use crate::storage::StorageError;

const HEALTHY: &str = "healthy";

/// JSON body with caching disabled
fn json<T: Serialize>(status: StatusCode, value: T) -> Response {
    (status, [(header::CACHE_CONTROL, NO_CACHE)], Json(value)).into_response()
}

/// Download submission endpoint (POST /api/download)
///
/// Takes a urlencoded form with a `url` field. Validation and the host check
/// happen before a job exists; on success the job is already running in the
/// background and the response is 202 with `{id, status}`.
pub async fn submit_download(
    State(state): State<AppState>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form?;
    let raw = form.url.unwrap_or_default();

    let submission = state.dispatcher.submit(&raw).await?;
    Ok(json(StatusCode::ACCEPTED, submission))
}

/// Job status by query string (GET /api/status?id=...)
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let id = query.id.unwrap_or_default();
    let snapshot = lookup(&state, id.trim())?;
    Ok(json(StatusCode::OK, snapshot))
}

/// Job status by path (GET /api/jobs/{id})
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot = lookup(&state, &id)?;
    Ok(json(StatusCode::OK, snapshot))
}

/// Every job in submission order (GET /api/jobs)
pub async fn list_jobs(State(state): State<AppState>) -> Response {
    let snapshots: Vec<JobSnapshot> = state
        .registry
        .list()
        .iter()
        .map(|job| job.snapshot())
        .collect();
    json(StatusCode::OK, snapshots)
}

fn lookup(state: &AppState, id: &str) -> Result<JobSnapshot, ApiError> {
    state
        .registry
        .get(id)
        .map(|job| job.snapshot())
        .ok_or_else(|| ApiError::NotFound("job".to_string()))
}

/// Output file retrieval (GET /files/{id}/{*path})
///
/// The path is resolved against the downloads root and must stay inside it;
/// the body is streamed from disk.
pub async fn download_file(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let outputs = state.outputs.clone();
    let resolved = tokio::task::spawn_blocking(move || outputs.resolve_output(&id, &path))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    let file = tokio::fs::File::open(&resolved)
        .await
        .map_err(StorageError::from)?;
    let length = file.metadata().await.map_err(StorageError::from)?.len();

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&resolved).to_string()),
        (header::CONTENT_LENGTH, length.to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// Health check endpoint (GET /health)
///
/// Reports the engine and the downloads root alongside job counters.
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> Response {
    let mut components = BTreeMap::new();
    components.insert("api".to_string(), HEALTHY.to_string());

    let engine = if state.engine.is_available() {
        HEALTHY.to_string()
    } else {
        format!("{} engine unavailable", state.engine.name())
    };
    components.insert("engine".to_string(), engine);

    let downloads = if state.outputs.path().is_dir() {
        HEALTHY.to_string()
    } else {
        "downloads root missing".to_string()
    };
    components.insert("downloads".to_string(), downloads);

    let all_healthy = components.values().all(|status| status == HEALTHY);
    let (status_code, overall_status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        jobs: state.registry.len(),
        metrics: state.metrics.snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    json(status_code, response)
}
