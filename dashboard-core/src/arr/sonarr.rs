//! Sonarr client: `/api/v3/{series,episode,episodefile,qualityprofile,
//! rename,command}` (spec.md §6).

use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct SonarrClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SonarrSeries {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SonarrRenameEntry {
    #[serde(rename = "seriesId")]
    pub series_id: i64,
    #[serde(rename = "episodeFileId")]
    pub episode_file_id: i64,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SonarrQualityProfile {
    pub id: i64,
    pub name: String,
    #[serde(rename = "cutoff")]
    pub cutoff_quality_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SonarrEpisode {
    pub id: i64,
    #[serde(rename = "seriesId")]
    pub series_id: i64,
    #[serde(rename = "episodeFileId")]
    pub episode_file_id: Option<i64>,
    #[serde(rename = "episodeFile")]
    pub episode_file: Option<SonarrEpisodeFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SonarrEpisodeFile {
    pub id: i64,
    pub path: String,
    #[serde(rename = "qualityCutoffNotMet")]
    pub quality_cutoff_not_met: bool,
    pub quality: Option<serde_json::Value>,
}

impl SonarrClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, ssl_verify: bool) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: super::build_client(ssl_verify)
                .map_err(|e| CoreError::ExternalProvider(format!("sonarr client build failed: {e}")))?,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("sonarr GET {path} failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("sonarr GET {path} returned error: {e}")))?
            .json::<T>()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("sonarr GET {path} decode failed: {e}")))
    }

    async fn post_command(&self, body: serde_json::Value) -> Result<()> {
        self.http
            .post(format!("{}/api/v3/command", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("sonarr command failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("sonarr command returned error: {e}")))?;
        Ok(())
    }

    pub async fn list_series(&self) -> Result<Vec<SonarrSeries>> {
        self.get("/api/v3/series", &[]).await
    }

    pub async fn command_rescan_series(&self, series_id: i64) -> Result<()> {
        self.post_command(json!({"name": "RescanSeries", "seriesId": series_id})).await
    }

    pub async fn list_rename(&self, series_id: i64) -> Result<Vec<SonarrRenameEntry>> {
        self.get("/api/v3/rename", &[("seriesId", &series_id.to_string())]).await
    }

    /// Synchronous rename command (used when `sonarr_send_to_queue` is
    /// false, spec.md §4.5, and by `ArrJobProcessor`/`PostCompleteHook`).
    pub async fn rename_files(&self, series_id: i64, episode_file_ids: &[i64]) -> Result<()> {
        self.post_command(json!({
            "name": "RenameFiles",
            "seriesId": series_id,
            "files": episode_file_ids,
        }))
        .await
    }

    pub async fn list_quality_profiles(&self) -> Result<Vec<SonarrQualityProfile>> {
        self.get("/api/v3/qualityprofile", &[]).await
    }

    /// Episodes with `includeEpisodeFile=true`; used by the quality scan
    /// to find files whose `qualityCutoffNotMet` flag is set.
    pub async fn list_episodes_with_files(&self, series_id: i64) -> Result<Vec<SonarrEpisode>> {
        self.get(
            "/api/v3/episode",
            &[
                ("seriesId", &series_id.to_string()),
                ("includeEpisodeFile", "true"),
            ],
        )
        .await
    }

    /// Look up an episode file by on-disk path, for `PostCompleteHook`
    /// step (a): "look up the file by its on-disk path".
    pub async fn find_file_by_path(&self, series_id: i64, path: &str) -> Result<Option<SonarrEpisodeFile>> {
        let episodes = self.list_episodes_with_files(series_id).await?;
        Ok(episodes.into_iter().find_map(|ep| {
            ep.episode_file.filter(|f| f.path == path)
        }))
    }
}
