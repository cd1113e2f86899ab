//! `PostCompleteHook`: the side effects run after a transcode job
//! completes (spec.md §4.7).
//!
//! Plex refresh is fire-and-forget — its failure is logged, never
//! propagated, since the transcode itself already succeeded. The arr
//! rescan-then-rename step is best-effort too, but distinct per provider
//! since only Sonarr/Radarr/Lidarr know how to look a file up by path, and
//! gated on the `auto_rename_after_transcode` setting (spec.md §4.7 step 2).

use tracing::{error, warn};

use crate::arr::{LidarrClient, PlexClient, RadarrClient, SonarrClient, SETTLE_DELAY};
use crate::db::Store;
use crate::error::Result;
use crate::settings::Settings;

pub struct PostCompleteHook {
    store: Store,
    plex: Option<PlexClient>,
    sonarr: Option<SonarrClient>,
    radarr: Option<RadarrClient>,
    lidarr: Option<LidarrClient>,
}

/// Which arr (if any) owns a completed file, and its associated
/// identifiers needed to look the file up post-rescan.
pub enum OwningProvider {
    None,
    Sonarr { series_id: i64 },
    Radarr { movie_id: i64 },
    Lidarr { artist_id: i64 },
}

impl PostCompleteHook {
    pub fn new(
        store: Store,
        plex: Option<PlexClient>,
        sonarr: Option<SonarrClient>,
        radarr: Option<RadarrClient>,
        lidarr: Option<LidarrClient>,
    ) -> Self {
        Self {
            store,
            plex,
            sonarr,
            radarr,
            lidarr,
        }
    }

    /// Step 1: request a Plex library refresh. Step 2: if the file came
    /// from an arr-managed library, rescan it and trigger a rename so the
    /// new (possibly extension-changed) filename gets picked up
    /// (spec.md §4.7).
    pub async fn run(&self, section_key: Option<&str>, filepath: &str, owner: OwningProvider) {
        if let (Some(plex), Some(key)) = (self.plex.as_ref(), section_key) {
            if let Err(err) = plex.refresh_library(key).await {
                warn!(error = %err, "plex refresh failed, continuing");
            }
        }

        if let Err(err) = self.rescan_and_rename(filepath, owner).await {
            error!(error = %err, %filepath, "post-complete arr rescan failed");
        }
    }

    async fn rescan_and_rename(&self, filepath: &str, owner: OwningProvider) -> Result<()> {
        if matches!(owner, OwningProvider::None) {
            return Ok(());
        }
        if !Settings::new(&self.store).auto_rename_after_transcode().await? {
            return Ok(());
        }

        match owner {
            OwningProvider::None => Ok(()),
            OwningProvider::Sonarr { series_id } => {
                let Some(sonarr) = self.sonarr.as_ref() else {
                    return Ok(());
                };
                sonarr.command_rescan_series(series_id).await?;
                tokio::time::sleep(SETTLE_DELAY).await;
                if let Some(file) = sonarr.find_file_by_path(series_id, filepath).await? {
                    sonarr.rename_files(series_id, &[file.id]).await?;
                }
                Ok(())
            }
            OwningProvider::Radarr { movie_id } => {
                let Some(radarr) = self.radarr.as_ref() else {
                    return Ok(());
                };
                radarr.command_rescan_movie(movie_id).await?;
                tokio::time::sleep(SETTLE_DELAY).await;
                if let Some(file) = radarr.find_file_by_path(movie_id, filepath).await? {
                    radarr.rename_files(movie_id, &[file.id]).await?;
                }
                Ok(())
            }
            OwningProvider::Lidarr { artist_id } => {
                let Some(lidarr) = self.lidarr.as_ref() else {
                    return Ok(());
                };
                lidarr.command_rescan_artist(artist_id).await?;
                tokio::time::sleep(SETTLE_DELAY).await;
                // Lidarr's rename API does not expose a by-path lookup
                // equivalent to Sonarr/Radarr's episode/movie file list;
                // the subsequent scheduled rename scan picks this up.
                Ok(())
            }
        }
    }
}
