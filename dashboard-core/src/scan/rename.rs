//! Rename and quality scans (spec.md §4.5, §4.6).
//!
//! Each `*_rename_scan` walks every series/movie/artist in the
//! corresponding *arr, triggers a rescan, waits out `SETTLE_DELAY` so the
//! *arr has time to pick up the refreshed on-disk state, then either
//! inserts an internal `Rename Job / awaiting_approval` (held until an
//! operator requeues it, which is the generic `requeue_job` mechanism
//! already used identically for cleanup jobs, dropping it to `pending`
//! for `ArrJobProcessor`'s drain to pick up) or calls `rename_files`
//! synchronously, depending on `sonarr_send_to_queue`/equivalent
//! (spec.md §4.5).

use serde_json::json;
use tracing::warn;

use crate::arr::{LidarrClient, RadarrClient, SonarrClient, SETTLE_DELAY};
use crate::db::Store;
use crate::error::Result;

use super::ScanGuard;

pub struct RenameScanOutcome {
    pub entries_seen: u64,
    pub jobs_inserted: u64,
}

pub async fn run_sonarr_rename_scan(
    store: &Store,
    guard: &ScanGuard,
    sonarr: &SonarrClient,
    send_to_queue: bool,
) -> Result<RenameScanOutcome> {
    let mut entries_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let series = sonarr.list_series().await?;
    let total = series.len() as u64;

    for (idx, show) in series.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Rescanning {}", show.title), idx as u64, total);

        if let Err(err) = sonarr.command_rescan_series(show.id).await {
            warn!(series_id = show.id, error = %err, "sonarr rescan command failed");
            continue;
        }
        tokio::time::sleep(SETTLE_DELAY).await;

        let entries = sonarr.list_rename(show.id).await?;
        entries_seen += entries.len() as u64;

        if send_to_queue {
            for entry in &entries {
                store
                    .insert_job(
                        &entry.path,
                        "Rename Job",
                        "awaiting_approval",
                        json!({
                            "source": "sonarr",
                            "seriesId": entry.series_id,
                            "episodeFileId": entry.episode_file_id,
                        }),
                    )
                    .await?;
                jobs_inserted += 1;
            }
        } else {
            let file_ids: Vec<i64> = entries.iter().map(|e| e.episode_file_id).collect();
            if !file_ids.is_empty() {
                sonarr.rename_files(show.id, &file_ids).await?;
            }
        }
    }

    Ok(RenameScanOutcome {
        entries_seen,
        jobs_inserted,
    })
}

pub async fn run_radarr_rename_scan(
    store: &Store,
    guard: &ScanGuard,
    radarr: &RadarrClient,
    send_to_queue: bool,
) -> Result<RenameScanOutcome> {
    let mut entries_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let movies = radarr.list_movies().await?;
    let total = movies.len() as u64;

    for (idx, movie) in movies.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Rescanning {}", movie.title), idx as u64, total);

        if let Err(err) = radarr.command_rescan_movie(movie.id).await {
            warn!(movie_id = movie.id, error = %err, "radarr rescan command failed");
            continue;
        }
        tokio::time::sleep(SETTLE_DELAY).await;

        let entries = radarr.list_rename(movie.id).await?;
        entries_seen += entries.len() as u64;

        if send_to_queue {
            for entry in &entries {
                store
                    .insert_job(
                        &entry.path,
                        "Rename Job",
                        "awaiting_approval",
                        json!({
                            "source": "radarr",
                            "movieId": entry.movie_id,
                            "movieFileId": entry.movie_file_id,
                        }),
                    )
                    .await?;
                jobs_inserted += 1;
            }
        } else {
            let file_ids: Vec<i64> = entries.iter().map(|e| e.movie_file_id).collect();
            if !file_ids.is_empty() {
                radarr.rename_files(movie.id, &file_ids).await?;
            }
        }
    }

    Ok(RenameScanOutcome {
        entries_seen,
        jobs_inserted,
    })
}

pub async fn run_lidarr_rename_scan(
    store: &Store,
    guard: &ScanGuard,
    lidarr: &LidarrClient,
    send_to_queue: bool,
) -> Result<RenameScanOutcome> {
    let mut entries_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let artists = lidarr.list_artists().await?;
    let total = artists.len() as u64;

    for (idx, artist) in artists.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Rescanning {}", artist.artist_name), idx as u64, total);

        if let Err(err) = lidarr.command_rescan_artist(artist.id).await {
            warn!(artist_id = artist.id, error = %err, "lidarr rescan command failed");
            continue;
        }
        tokio::time::sleep(SETTLE_DELAY).await;

        let entries = lidarr.list_rename(artist.id).await?;
        entries_seen += entries.len() as u64;

        if send_to_queue {
            for entry in &entries {
                store
                    .insert_job(
                        &entry.path,
                        "Rename Job",
                        "awaiting_approval",
                        json!({
                            "source": "lidarr",
                            "artistId": entry.artist_id,
                            "trackFileId": entry.track_file_id,
                        }),
                    )
                    .await?;
                jobs_inserted += 1;
            }
        } else {
            let file_ids: Vec<i64> = entries.iter().map(|e| e.track_file_id).collect();
            if !file_ids.is_empty() {
                lidarr.rename_files(artist.id, &file_ids).await?;
            }
        }
    }

    Ok(RenameScanOutcome {
        entries_seen,
        jobs_inserted,
    })
}

pub struct QualityScanOutcome {
    pub episodes_seen: u64,
    pub jobs_inserted: u64,
}

/// Quality scan (spec.md §4.5): enumerate every series' episodes with
/// files, and for any file whose `qualityCutoffNotMet` flag is set,
/// insert an internal `Quality Mismatch/pending` job. These never reach
/// a worker (`Store::claim_one_job` excludes them); they exist purely as
/// an operator-visible flag, mirroring the Rename Job pattern.
pub async fn run_sonarr_quality_scan(
    store: &Store,
    guard: &ScanGuard,
    sonarr: &SonarrClient,
) -> Result<QualityScanOutcome> {
    let mut episodes_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let series = sonarr.list_series().await?;
    let total = series.len() as u64;

    for (idx, show) in series.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Checking quality for {}", show.title), idx as u64, total);

        let episodes = sonarr.list_episodes_with_files(show.id).await?;
        for episode in episodes {
            let Some(file) = episode.episode_file else {
                continue;
            };
            episodes_seen += 1;

            if !file.quality_cutoff_not_met {
                continue;
            }

            store
                .insert_job(
                    &file.path,
                    "Quality Mismatch",
                    "pending",
                    json!({
                        "source": "sonarr",
                        "seriesId": show.id,
                        "episodeId": episode.id,
                        "episodeFileId": file.id,
                        "quality": file.quality,
                    }),
                )
                .await?;
            jobs_inserted += 1;
        }
    }

    Ok(QualityScanOutcome {
        episodes_seen,
        jobs_inserted,
    })
}
