//! Operator-facing endpoints (spec.md §6): node management, job queue
//! control, scan triggers, history/failure logs, settings, Plex/arr
//! introspection, data export, and backups.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use dashboard_core::db::store::JobListFilters;
use dashboard_core::scan::{ScanSource, ScanType};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------

pub async fn list_nodes(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let nodes = state.store.list_nodes().await?;
    Ok(Json(json!({ "nodes": nodes })))
}

#[derive(Debug, Deserialize)]
pub struct NodeCommandRequest {
    pub command: String,
}

pub async fn set_node_command(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
    Json(body): Json<NodeCommandRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !matches!(body.command.as_str(), "idle" | "running" | "paused" | "quit") {
        return Err(AppError::bad_request("command must be one of idle, running, paused, quit"));
    }
    state.store.set_node_command(&hostname, &body.command).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn delete_node(State(state): State<AppState>, Path(hostname): Path<String>) -> AppResult<Json<serde_json::Value>> {
    state.store.delete_node(&hostname).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let filters = JobListFilters {
        status: query.status,
        job_type: query.job_type,
    };
    let jobs = state
        .queue
        .list(&filters, query.page.unwrap_or(0), query.page_size.unwrap_or(50))
        .await?;
    Ok(Json(json!({ "jobs": jobs })))
}

pub async fn delete_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> AppResult<Json<serde_json::Value>> {
    state.queue.delete(job_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn requeue_job(State(state): State<AppState>, Path(job_id): Path<i64>) -> AppResult<Json<serde_json::Value>> {
    state.queue.requeue(job_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn clear_queue(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.queue.clear().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn stuck_jobs(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let window = chrono::Duration::from_std(state.config.freshness_window).unwrap_or_else(|_| chrono::Duration::minutes(5));
    let jobs = state.queue.stuck_jobs(window).await?;
    Ok(Json(json!({ "stuck_jobs": jobs.iter().map(|j| json!({
        "id": j.id,
        "filepath": j.filepath,
        "assigned_to": j.assigned_to,
    })).collect::<Vec<_>>() })))
}

// ---------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------

pub async fn scan_progress(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.scans.snapshot()).unwrap_or_default())
}

pub async fn cancel_scan(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scans.cancel();
    Json(json!({ "success": true }))
}

pub async fn trigger_media_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let source = if state.plex.is_some() { ScanSource::Plex } else { ScanSource::Internal };
    let guard = state.scans.try_start(source, ScanType::Media)?;

    let store = state.store.clone();
    let plex = state.plex.clone();
    let roots: Vec<std::path::PathBuf> = state.config.scan_roots.iter().map(std::path::PathBuf::from).collect();
    let settings = state.settings();
    let allow_av1_reencode = settings.get_bool("allow_av1_reencode", false).await.unwrap_or(false);
    let allow_vp9_reencode = settings.get_bool("allow_vp9_reencode", false).await.unwrap_or(false);

    tokio::spawn(async move {
        let skip_policy = dashboard_core::scan::media::CodecSkipPolicy {
            allow_av1_reencode,
            allow_vp9_reencode,
        };
        let result = match plex {
            Some(plex) => dashboard_core::scan::media::run_plex_scan(&store, &guard, &plex, &skip_policy, false).await.map(|_| ()),
            None => dashboard_core::scan::media::run_internal_scan(
                &store,
                &guard,
                &roots,
                &skip_policy,
                false,
                dashboard_core::scan::media::ffprobe_video_codec,
            )
            .await
            .map(|_| ()),
        };
        if let Err(err) = result {
            error!(error = %err, "media scan failed");
        }
    });

    Ok(Json(json!({ "started": true })))
}

pub async fn trigger_sonarr_rename_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(sonarr) = state.sonarr.clone() else {
        return Err(AppError::bad_request("sonarr is not configured"));
    };
    let guard = state.scans.try_start(ScanSource::Sonarr, ScanType::Rename)?;
    let store = state.store.clone();
    let send_to_queue = state.settings().get_bool("sonarr_send_to_queue", true).await.unwrap_or(true);
    tokio::spawn(async move {
        if let Err(err) = dashboard_core::scan::rename::run_sonarr_rename_scan(&store, &guard, &sonarr, send_to_queue).await {
            error!(error = %err, "sonarr rename scan failed");
        }
    });
    Ok(Json(json!({ "started": true })))
}

pub async fn trigger_sonarr_quality_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(sonarr) = state.sonarr.clone() else {
        return Err(AppError::bad_request("sonarr is not configured"));
    };
    let guard = state.scans.try_start(ScanSource::Sonarr, ScanType::Quality)?;
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = dashboard_core::scan::rename::run_sonarr_quality_scan(&store, &guard, &sonarr).await {
            error!(error = %err, "sonarr quality scan failed");
        }
    });
    Ok(Json(json!({ "started": true })))
}

pub async fn trigger_radarr_rename_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(radarr) = state.radarr.clone() else {
        return Err(AppError::bad_request("radarr is not configured"));
    };
    let guard = state.scans.try_start(ScanSource::Radarr, ScanType::Rename)?;
    let store = state.store.clone();
    let send_to_queue = state.settings().get_bool("radarr_send_to_queue", true).await.unwrap_or(true);
    tokio::spawn(async move {
        if let Err(err) = dashboard_core::scan::rename::run_radarr_rename_scan(&store, &guard, &radarr, send_to_queue).await {
            error!(error = %err, "radarr rename scan failed");
        }
    });
    Ok(Json(json!({ "started": true })))
}

pub async fn trigger_lidarr_rename_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(lidarr) = state.lidarr.clone() else {
        return Err(AppError::bad_request("lidarr is not configured"));
    };
    let guard = state.scans.try_start(ScanSource::Lidarr, ScanType::Rename)?;
    let store = state.store.clone();
    let send_to_queue = state.settings().get_bool("lidarr_send_to_queue", true).await.unwrap_or(true);
    tokio::spawn(async move {
        if let Err(err) = dashboard_core::scan::rename::run_lidarr_rename_scan(&store, &guard, &lidarr, send_to_queue).await {
            error!(error = %err, "lidarr rename scan failed");
        }
    });
    Ok(Json(json!({ "started": true })))
}

pub async fn trigger_cleanup_scan(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(plex) = state.plex.clone() else {
        return Err(AppError::bad_request("plex is not configured"));
    };
    let guard = state.scans.try_start(ScanSource::Plex, ScanType::Cleanup)?;
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = dashboard_core::scan::cleanup::run_cleanup_scan(&store, &guard, &plex, None).await {
            error!(error = %err, "cleanup scan failed");
        }
    });
    Ok(Json(json!({ "started": true })))
}

// ---------------------------------------------------------------------
// History / failures
// ---------------------------------------------------------------------

pub async fn list_history(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let rows = state.store.list_history().await?;
    Ok(Json(json!({ "history": rows })))
}

pub async fn clear_history(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.store.clear_history().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn list_failures(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let rows = state.store.list_failures().await?;
    Ok(Json(json!({ "failures": rows })))
}

pub async fn clear_failures(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.store.clear_failures().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

// ---------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------

pub async fn list_settings(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let rows = state.store.list_settings().await?;
    Ok(Json(json!({ "settings": rows })))
}

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub key: String,
    pub value: String,
}

pub async fn set_setting(
    State(state): State<AppState>,
    Json(body): Json<SetSettingRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.settings().set(&body.key, &body.value).await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------
// Plex / arr introspection
// ---------------------------------------------------------------------

pub async fn plex_libraries(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let Some(plex) = state.plex.as_ref() else {
        return Err(AppError::bad_request("plex is not configured"));
    };
    let libraries = plex.list_libraries().await?;
    Ok(Json(json!({ "libraries": libraries })))
}

pub async fn arr_test(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sonarr_ok = match &state.sonarr {
        Some(client) => client.list_series().await.is_ok(),
        None => false,
    };
    let radarr_ok = match &state.radarr {
        Some(client) => client.list_movies().await.is_ok(),
        None => false,
    };
    let lidarr_ok = match &state.lidarr {
        Some(client) => client.list_artists().await.is_ok(),
        None => false,
    };
    Json(json!({
        "sonarr": sonarr_ok,
        "radarr": radarr_ok,
        "lidarr": lidarr_ok,
    }))
}

// ---------------------------------------------------------------------
// Data export
// ---------------------------------------------------------------------

/// A single JSON document snapshotting every operator-visible table
/// (spec.md §6).
pub async fn export(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let nodes = state.store.list_nodes().await?;
    let jobs = state
        .queue
        .list(&JobListFilters::default(), 0, i64::MAX / 2)
        .await?;
    let history = state.store.list_history().await?;
    let failures = state.store.list_failures().await?;
    let settings = state.store.list_settings().await?;

    Ok(Json(json!({
        "nodes": nodes,
        "jobs": jobs,
        "history": history,
        "failures": failures,
        "settings": settings,
        "exported_at": chrono::Utc::now().to_rfc3339(),
    })))
}

// ---------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------

pub async fn list_backups(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let archives = state.backups.list().await?;
    let names: Vec<String> = archives
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    Ok(Json(json!({ "backups": names })))
}

pub async fn trigger_backup(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let path = state.backups.run_once().await?;
    Ok(Json(json!({ "path": path.display().to_string() })))
}

pub async fn download_backup(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Vec<u8>> {
    let path = state.backups.resolve(&name)?;
    tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::new(StatusCode::NOT_FOUND, format!("backup {name} not found: {e}")))
}

pub async fn delete_backup(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Json<serde_json::Value>> {
    state.backups.delete(&name).await?;
    Ok(Json(json!({ "success": true })))
}
