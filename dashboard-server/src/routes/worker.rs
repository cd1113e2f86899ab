//! Worker-facing endpoints (spec.md §6): register, request/claim a job,
//! report a terminal outcome, read settings, and the health probe.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use dashboard_core::post_complete::OwningProvider;
use dashboard_core::CoreError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// `hostname`/`session_token` are `Option` so a missing field surfaces as
/// `CoreError::MissingSession` (401) from inside the handler rather than
/// axum's JSON extractor rejecting the request with a generic 400 before
/// the handler runs (spec.md §4.3).
#[derive(Debug, Deserialize)]
pub struct RegisterWorkerRequest {
    pub hostname: Option<String>,
    pub session_token: Option<String>,
    pub version: String,
}

pub async fn register_worker(
    State(state): State<AppState>,
    Json(body): Json<RegisterWorkerRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let hostname = body.hostname.as_deref().ok_or(CoreError::MissingSession)?;
    let session_token = body.session_token.as_deref().ok_or(CoreError::MissingSession)?;
    state.sessions.register(hostname, session_token, &body.version).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct RequestJobRequest {
    pub hostname: Option<String>,
    pub session_token: Option<String>,
}

pub async fn request_job(
    State(state): State<AppState>,
    Json(body): Json<RequestJobRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let hostname = body.hostname.as_deref().ok_or(CoreError::MissingSession)?;
    let session_token = body.session_token.as_deref().ok_or(CoreError::MissingSession)?;
    state.sessions.validate(hostname, session_token).await?;

    match state.queue.claim_one(hostname).await? {
        Some(job) => Ok(Json(json!({
            "job_id": job.id,
            "filepath": job.filepath,
            "job_type": job.job_type,
        }))),
        None => Ok(Json(json!({}))),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub hostname: Option<String>,
    pub session_token: Option<String>,
    pub status: UpdateStatus,
    pub original_size: Option<i64>,
    pub new_size: Option<i64>,
    pub reason: Option<String>,
    pub log: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct UpdateJobResponse {
    pub message: String,
}

/// Terminal job update (spec.md §4.7, §6). On a completed `transcode`
/// job, fires `PostCompleteHook` in the background after the queue
/// transition commits, so the worker's HTTP response is never held up
/// by a slow Plex/arr round trip.
pub async fn update_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(body): Json<UpdateJobRequest>,
) -> AppResult<Json<UpdateJobResponse>> {
    let hostname = body.hostname.as_deref().ok_or(CoreError::MissingSession)?;
    let session_token = body.session_token.as_deref().ok_or(CoreError::MissingSession)?;
    state.sessions.validate(hostname, session_token).await?;

    let job = state.store.get_job(job_id).await?;

    match body.status {
        UpdateStatus::Failed => {
            state.queue.fail(job_id, body.reason.as_deref(), body.log.as_deref()).await?;
        }
        UpdateStatus::Completed => {
            if job.job_type == "cleanup" {
                state.queue.complete_cleanup(job_id, hostname).await?;
            } else {
                let original_size = body
                    .original_size
                    .ok_or_else(|| AppError::bad_request("original_size is required for transcode completion"))?;
                let new_size = body
                    .new_size
                    .ok_or_else(|| AppError::bad_request("new_size is required for transcode completion"))?;
                state
                    .queue
                    .complete_transcode(job_id, original_size, new_size, hostname)
                    .await?;

                spawn_post_complete(state.clone(), job.filepath.clone(), job.metadata.clone());
            }
        }
    }

    Ok(Json(UpdateJobResponse {
        message: "job updated".to_string(),
    }))
}

fn spawn_post_complete(state: AppState, filepath: String, metadata: serde_json::Value) {
    tokio::spawn(async move {
        let hook = dashboard_core::post_complete::PostCompleteHook::new(
            state.store.clone(),
            state.plex.clone(),
            state.sonarr.clone(),
            state.radarr.clone(),
            state.lidarr.clone(),
        );
        let section_key = metadata.get("plexSectionKey").and_then(|v| v.as_str());
        let owner = owning_provider_from_metadata(&metadata);
        hook.run(section_key, &filepath, owner).await;
    });
}

fn owning_provider_from_metadata(metadata: &serde_json::Value) -> OwningProvider {
    match metadata.get("source").and_then(|v| v.as_str()) {
        Some("sonarr") => metadata
            .get("seriesId")
            .and_then(|v| v.as_i64())
            .map(|series_id| OwningProvider::Sonarr { series_id })
            .unwrap_or(OwningProvider::None),
        Some("radarr") => metadata
            .get("movieId")
            .and_then(|v| v.as_i64())
            .map(|movie_id| OwningProvider::Radarr { movie_id })
            .unwrap_or(OwningProvider::None),
        Some("lidarr") => metadata
            .get("artistId")
            .and_then(|v| v.as_i64())
            .map(|artist_id| OwningProvider::Lidarr { artist_id })
            .unwrap_or(OwningProvider::None),
        _ => OwningProvider::None,
    }
}

/// `GET /api/settings` — session required via query params, since this
/// is a `GET` with no body (spec.md §6).
pub async fn get_settings(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<serde_json::Value>> {
    let hostname = params.get("hostname").ok_or(CoreError::MissingSession)?;
    let session_token = params.get("session_token").ok_or(CoreError::MissingSession)?;
    state.sessions.validate(hostname, session_token).await?;

    let rows = state.store.list_settings().await?;
    let settings: serde_json::Map<String, serde_json::Value> = rows
        .into_iter()
        .map(|row| (row.key, json!({ "setting_value": row.value })))
        .collect();

    Ok(Json(json!({
        "settings": settings,
        "dashboard_version": env!("CARGO_PKG_VERSION"),
    })))
}

/// `GET /api/health` — bypasses auth entirely; 503 until migrations
/// finish (spec.md §4.8).
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting up")
    }
}
