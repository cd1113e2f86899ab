//! Lidarr client (API v1): `/api/v1/{artist,album,rename,command}`
//! (spec.md §6). Analogous to the Sonarr/Radarr clients, keyed on
//! artists and track files.

use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct LidarrClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LidarrArtist {
    pub id: i64,
    #[serde(rename = "artistName")]
    pub artist_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LidarrRenameEntry {
    #[serde(rename = "artistId")]
    pub artist_id: i64,
    #[serde(rename = "trackFileId")]
    pub track_file_id: i64,
    pub path: String,
}

impl LidarrClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, ssl_verify: bool) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: super::build_client(ssl_verify)
                .map_err(|e| CoreError::ExternalProvider(format!("lidarr client build failed: {e}")))?,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("lidarr GET {path} failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("lidarr GET {path} returned error: {e}")))?
            .json::<T>()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("lidarr GET {path} decode failed: {e}")))
    }

    async fn post_command(&self, body: serde_json::Value) -> Result<()> {
        self.http
            .post(format!("{}/api/v1/command", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("lidarr command failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("lidarr command returned error: {e}")))?;
        Ok(())
    }

    pub async fn list_artists(&self) -> Result<Vec<LidarrArtist>> {
        self.get("/api/v1/artist", &[]).await
    }

    pub async fn command_rescan_artist(&self, artist_id: i64) -> Result<()> {
        self.post_command(json!({"name": "RescanArtist", "artistId": artist_id})).await
    }

    pub async fn list_rename(&self, artist_id: i64) -> Result<Vec<LidarrRenameEntry>> {
        self.get("/api/v1/rename", &[("artistId", &artist_id.to_string())]).await
    }

    pub async fn rename_files(&self, artist_id: i64, track_file_ids: &[i64]) -> Result<()> {
        self.post_command(json!({
            "name": "RenameFiles",
            "artistId": artist_id,
            "files": track_file_ids,
        }))
        .await
    }
}
