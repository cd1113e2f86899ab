//! Plex client: token-authenticated server URL, used to enumerate
//! libraries/media and to request library refreshes (spec.md §6).

use serde::Deserialize;

use crate::error::{CoreError, Result};

#[derive(Clone)]
pub struct PlexClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexLibrary {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexMedia {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    pub title: String,
    /// Primary media codec and on-disk path, reloaded per-item per
    /// spec.md §4.5.
    pub codec: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexPart {
    file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexMediaStream {
    #[serde(rename = "videoCodec")]
    video_codec: Option<String>,
    #[serde(rename = "Part", default)]
    part: Vec<PlexPart>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexMetadataItem {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "Media", default)]
    media: Vec<PlexMediaStream>,
}

impl PlexClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .map_err(|e| CoreError::ExternalProvider(format!("plex client build failed: {e}")))?,
        })
    }

    pub async fn list_libraries(&self) -> Result<Vec<PlexLibrary>> {
        #[derive(Deserialize)]
        struct Directory {
            #[serde(rename = "Directory", default)]
            directory: Vec<PlexLibrary>,
        }
        #[derive(Deserialize)]
        struct MediaContainer {
            #[serde(rename = "MediaContainer")]
            media_container: Directory,
        }

        let resp: MediaContainer = self
            .http
            .get(format!("{}/library/sections", self.base_url))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("plex library list failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("plex library list returned error: {e}")))?
            .json()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("plex library list decode failed: {e}")))?;

        Ok(resp.media_container.directory)
    }

    /// List every item in a library section with its primary codec and
    /// on-disk path already inlined by Plex's `/all` response — the
    /// per-item "reload" spec.md §4.5 describes is this one listing
    /// call rather than a second round trip per item, since Plex
    /// already attaches `Media`/`Part` to each `Metadata` entry here.
    pub async fn list_section_items(&self, section_key: &str) -> Result<Vec<PlexMedia>> {
        #[derive(Deserialize)]
        struct Directory {
            #[serde(rename = "Metadata", default)]
            metadata: Vec<PlexMetadataItem>,
        }
        #[derive(Deserialize)]
        struct MediaContainer {
            #[serde(rename = "MediaContainer")]
            media_container: Directory,
        }

        let resp: MediaContainer = self
            .http
            .get(format!("{}/library/sections/{}/all", self.base_url, section_key))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("plex section list failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("plex section list returned error: {e}")))?
            .json()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("plex section list decode failed: {e}")))?;

        Ok(resp
            .media_container
            .metadata
            .into_iter()
            .map(|item| {
                let stream = item.media.into_iter().next();
                PlexMedia {
                    rating_key: item.rating_key,
                    title: item.title,
                    codec: stream.as_ref().and_then(|m| m.video_codec.clone()),
                    file_path: stream.and_then(|m| m.part.into_iter().next()).and_then(|p| p.file),
                }
            })
            .collect())
    }

    /// Request a refresh of a library (PostCompleteHook step 1,
    /// fire-and-forget; errors are logged, not fatal, per spec.md §4.7).
    pub async fn refresh_library(&self, section_key: &str) -> Result<()> {
        self.http
            .get(format!("{}/library/sections/{}/refresh", self.base_url, section_key))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| CoreError::ExternalProvider(format!("plex refresh failed: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::ExternalProvider(format!("plex refresh returned error: {e}")))?;
        Ok(())
    }
}
