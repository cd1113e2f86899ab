//! `ArrJobProcessor`: drains internal `Rename Job` rows by calling back
//! into Sonarr/Radarr/Lidarr (spec.md §4.6).

use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::Store;
use crate::error::Result;

use super::{LidarrClient, RadarrClient, SonarrClient};

const DRAIN_INTERVAL: Duration = Duration::from_secs(60);
const DRAIN_BATCH: i64 = 20;

pub struct ArrJobProcessor {
    store: Store,
    sonarr: Option<SonarrClient>,
    radarr: Option<RadarrClient>,
    lidarr: Option<LidarrClient>,
}

impl ArrJobProcessor {
    pub fn new(
        store: Store,
        sonarr: Option<SonarrClient>,
        radarr: Option<RadarrClient>,
        lidarr: Option<LidarrClient>,
    ) -> Self {
        Self {
            store,
            sonarr,
            radarr,
            lidarr,
        }
    }

    /// Spawn the periodic drain loop. Uses per-row `SKIP LOCKED` claims
    /// (`Store::claim_rename_jobs`) rather than the scanner exclusion —
    /// it never competes with `ScanOrchestrator` for the scan lock
    /// (spec.md §5).
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DRAIN_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(err) = self.drain_once().await {
                    error!(error = %err, "arr job drain iteration failed");
                }
            }
        })
    }

    pub async fn drain_once(&self) -> Result<()> {
        let jobs = self.store.claim_rename_jobs(DRAIN_BATCH).await?;
        if jobs.is_empty() {
            return Ok(());
        }
        info!(count = jobs.len(), "draining rename jobs");

        for job in jobs {
            let outcome = self.dispatch_one(&job.metadata).await;
            match outcome {
                Ok(()) => {
                    if let Err(err) = self.store.complete_internal_job(job.id).await {
                        error!(job_id = job.id, error = %err, "failed to mark rename job completed");
                    }
                }
                Err(reason) => {
                    warn!(job_id = job.id, %reason, "rename job failed");
                    if let Err(err) = self.store.fail_job(job.id, Some(&reason), None).await {
                        error!(job_id = job.id, error = %err, "failed to mark rename job failed");
                    }
                }
            }
        }

        Ok(())
    }

    /// Dispatches the appropriate provider command based on
    /// `metadata.source`. Missing identity fields fail immediately
    /// without any outbound call (spec.md §4.6).
    async fn dispatch_one(&self, metadata: &Value) -> std::result::Result<(), String> {
        match RenameTarget::parse(metadata)? {
            RenameTarget::Sonarr { series_id, file_id } => self
                .sonarr
                .as_ref()
                .ok_or("sonarr is not configured")?
                .rename_files(series_id, &[file_id])
                .await
                .map_err(|e| e.to_string()),
            RenameTarget::Radarr { movie_id, file_id } => self
                .radarr
                .as_ref()
                .ok_or("radarr is not configured")?
                .rename_files(movie_id, &[file_id])
                .await
                .map_err(|e| e.to_string()),
            RenameTarget::Lidarr { artist_id, file_id } => self
                .lidarr
                .as_ref()
                .ok_or("lidarr is not configured")?
                .rename_files(artist_id, &[file_id])
                .await
                .map_err(|e| e.to_string()),
        }
    }
}

/// The provider + identity fields extracted from a `Rename Job`'s
/// metadata, independent of which clients happen to be configured —
/// factored out so parsing can be unit-tested without a live `Store`.
enum RenameTarget {
    Sonarr { series_id: i64, file_id: i64 },
    Radarr { movie_id: i64, file_id: i64 },
    Lidarr { artist_id: i64, file_id: i64 },
}

impl RenameTarget {
    fn parse(metadata: &Value) -> std::result::Result<Self, String> {
        let source = metadata.get("source").and_then(Value::as_str).unwrap_or("");
        let field = |name: &str| metadata.get(name).and_then(Value::as_i64).ok_or(format!("missing {name}"));

        match source {
            "sonarr" => Ok(RenameTarget::Sonarr {
                series_id: field("seriesId")?,
                file_id: field("episodeFileId")?,
            }),
            "radarr" => Ok(RenameTarget::Radarr {
                movie_id: field("movieId")?,
                file_id: field("movieFileId")?,
            }),
            "lidarr" => Ok(RenameTarget::Lidarr {
                artist_id: field("artistId")?,
                file_id: field("trackFileId")?,
            }),
            other => Err(format!("unknown rename job source: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_unknown_source() {
        let err = RenameTarget::parse(&json!({"source": "unknown"})).unwrap_err();
        assert!(err.contains("unknown rename job source"));
    }

    #[test]
    fn parse_rejects_missing_identity_fields() {
        let err = RenameTarget::parse(&json!({"source": "sonarr"})).unwrap_err();
        assert_eq!(err, "missing seriesId");
    }

    #[test]
    fn parse_accepts_well_formed_sonarr_metadata() {
        let target = RenameTarget::parse(&json!({
            "source": "sonarr",
            "seriesId": 10,
            "episodeFileId": 20,
        }))
        .unwrap();
        assert!(matches!(
            target,
            RenameTarget::Sonarr { series_id: 10, file_id: 20 }
        ));
    }
}
