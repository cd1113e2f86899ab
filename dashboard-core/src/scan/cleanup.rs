//! Cleanup scan (spec.md §4.5): derive scan roots from Plex libraries,
//! walk for leftover transcode artifacts, queue them for operator
//! approval before deletion.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::debug;

use crate::arr::PlexClient;
use crate::db::Store;
use crate::error::Result;

use super::ScanGuard;

/// A Plex on-disk root, optionally rewritten to the path as seen by this
/// process (spec.md §4.5: "Plex's on-disk path may differ from the
/// dashboard's mount point; apply the configured host-path rewrite
/// before walking").
#[derive(Debug, Clone)]
pub struct HostPathRewrite {
    pub plex_prefix: String,
    pub local_prefix: String,
}

impl HostPathRewrite {
    pub fn apply(&self, plex_path: &str) -> PathBuf {
        match plex_path.strip_prefix(&self.plex_prefix) {
            Some(rest) => Path::new(&self.local_prefix).join(rest.trim_start_matches('/')),
            None => PathBuf::from(plex_path),
        }
    }
}

pub struct CleanupScanOutcome {
    pub candidates_seen: u64,
    pub jobs_inserted: u64,
}

/// A leftover artifact matches `.lock` or a `tmp_*` prefix — the two
/// patterns transcoding workers leave behind on interruption.
fn is_leftover_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".lock") || name.starts_with("tmp_")
}

pub async fn run_cleanup_scan(
    store: &Store,
    guard: &ScanGuard,
    plex: &PlexClient,
    rewrite: Option<&HostPathRewrite>,
) -> Result<CleanupScanOutcome> {
    let mut candidates_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let libraries = plex.list_libraries().await?;
    let roots: Vec<PathBuf> = libraries
        .iter()
        .map(|lib| {
            let raw = format!("/data/{}", lib.key);
            match rewrite {
                Some(r) => r.apply(&raw),
                None => PathBuf::from(raw),
            }
        })
        .collect();

    let mut found = Vec::new();
    for root in &roots {
        walk_for_artifacts(root, &mut found);
    }

    let total = found.len() as u64;
    for (idx, path) in found.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Found {}", path.display()), idx as u64, total);
        candidates_seen += 1;

        let filepath = path.to_string_lossy().to_string();
        if store.job_exists(&filepath).await? {
            continue;
        }

        debug!(path = %filepath, "queuing cleanup candidate");
        store
            .insert_job(&filepath, "cleanup", "awaiting_approval", json!({}))
            .await?;
        jobs_inserted += 1;
    }

    Ok(CleanupScanOutcome {
        candidates_seen,
        jobs_inserted,
    })
}

fn walk_for_artifacts(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_for_artifacts(&path, out);
            continue;
        }
        if is_leftover_artifact(&path) {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_lock_files_and_tmp_prefix() {
        assert!(is_leftover_artifact(Path::new("/data/movie.mkv.lock")));
        assert!(is_leftover_artifact(Path::new("/data/tmp_movie.mkv")));
        assert!(!is_leftover_artifact(Path::new("/data/movie.mkv")));
    }

    #[test]
    fn host_path_rewrite_replaces_matching_prefix() {
        let rewrite = HostPathRewrite {
            plex_prefix: "/media".to_string(),
            local_prefix: "/mnt/storage".to_string(),
        };
        assert_eq!(
            rewrite.apply("/media/movies/foo.mkv"),
            PathBuf::from("/mnt/storage/movies/foo.mkv")
        );
    }

    #[test]
    fn host_path_rewrite_passes_through_unmatched_paths() {
        let rewrite = HostPathRewrite {
            plex_prefix: "/media".to_string(),
            local_prefix: "/mnt/storage".to_string(),
        };
        assert_eq!(
            rewrite.apply("/other/movies/foo.mkv"),
            PathBuf::from("/other/movies/foo.mkv")
        );
    }
}
