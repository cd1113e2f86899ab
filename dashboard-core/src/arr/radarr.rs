//! Radarr client: `/api/v3/{movie,rename,command}` (spec.md §6).
//! Analogous to [`super::sonarr::SonarrClient`], keyed on movies instead
//! of series/episodes.

use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct RadarrClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadarrMovie {
    pub id: i64,
    pub title: String,
    #[serde(rename = "movieFile")]
    pub movie_file: Option<RadarrMovieFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadarrMovieFile {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadarrRenameEntry {
    #[serde(rename = "movieId")]
    pub movie_id: i64,
    #[serde(rename = "movieFileId")]
    pub movie_file_id: i64,
    pub path: String,
}

impl RadarrClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, ssl_verify: bool) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: super::build_client(ssl_verify)
                .map_err(|e| CoreError::ExternalProvider(format!("radarr client build failed: {e}")))?,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("radarr GET {path} failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("radarr GET {path} returned error: {e}")))?
            .json::<T>()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("radarr GET {path} decode failed: {e}")))
    }

    async fn post_command(&self, body: serde_json::Value) -> Result<()> {
        self.http
            .post(format!("{}/api/v3/command", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("radarr command failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("radarr command returned error: {e}")))?;
        Ok(())
    }

    pub async fn list_movies(&self) -> Result<Vec<RadarrMovie>> {
        self.get("/api/v3/movie", &[]).await
    }

    pub async fn command_rescan_movie(&self, movie_id: i64) -> Result<()> {
        self.post_command(json!({"name": "RescanMovie", "movieId": movie_id})).await
    }

    pub async fn list_rename(&self, movie_id: i64) -> Result<Vec<RadarrRenameEntry>> {
        self.get("/api/v3/rename", &[("movieId", &movie_id.to_string())]).await
    }

    pub async fn rename_files(&self, movie_id: i64, movie_file_ids: &[i64]) -> Result<()> {
        self.post_command(json!({
            "name": "RenameFiles",
            "movieId": movie_id,
            "files": movie_file_ids,
        }))
        .await
    }

    pub async fn find_file_by_path(&self, movie_id: i64, path: &str) -> Result<Option<RadarrMovieFile>> {
        let movies = self.list_movies().await?;
        Ok(movies
            .into_iter()
            .find(|m| m.id == movie_id)
            .and_then(|m| m.movie_file)
            .filter(|f| f.path == path))
    }
}
