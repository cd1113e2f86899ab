//! Media scan (Plex or Internal), spec.md §4.5.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, warn};

use crate::arr::PlexClient;
use crate::db::Store;
use crate::error::Result;

use super::ScanGuard;

/// The fixed extension allow-list for the internal scanner.
const SCANNABLE_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "wmv", "flv", "webm"];

#[derive(Debug, Clone, Default)]
pub struct CodecSkipPolicy {
    pub allow_av1_reencode: bool,
    pub allow_vp9_reencode: bool,
}

impl CodecSkipPolicy {
    /// The skip-set starts from `{hevc, h265}` and adds `av1` and/or
    /// `vp9` unless the corresponding "allow re-encode" flag is set
    /// (spec.md §4.5).
    pub fn should_skip(&self, codec: &str) -> bool {
        let codec = codec.to_ascii_lowercase();
        match codec.as_str() {
            "hevc" | "h265" => true,
            "av1" => !self.allow_av1_reencode,
            "vp9" => !self.allow_vp9_reencode,
            _ => false,
        }
    }
}

pub struct MediaScanOutcome {
    pub candidates_seen: u64,
    pub jobs_inserted: u64,
}

/// Internal scanner: walk configured subpaths under the media root,
/// restricted to the fixed extension set, probe each file's codec via
/// the supplied `probe_codec` callback (ffprobe invocation lives on the
/// worker/ambient infra layer; here it is injected so the orchestrator
/// stays testable without real media files).
pub async fn run_internal_scan(
    store: &Store,
    guard: &ScanGuard,
    roots: &[PathBuf],
    skip_policy: &CodecSkipPolicy,
    force_scan: bool,
    probe_codec: impl Fn(&Path) -> Option<String>,
) -> Result<MediaScanOutcome> {
    let mut candidates_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let extensions: HashSet<&str> = SCANNABLE_EXTENSIONS.iter().copied().collect();

    let mut files = Vec::new();
    for root in roots {
        collect_files(root, &extensions, &mut files);
    }

    let total = files.len() as u64;
    for (idx, file) in files.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }

        guard.set_step(format!("Probing {}", file.display()), idx as u64, total);
        candidates_seen += 1;

        let Some(codec) = probe_codec(file) else {
            warn!(path = %file.display(), "failed to probe codec, skipping");
            continue;
        };

        if skip_policy.should_skip(&codec) {
            continue;
        }

        let filepath = file.to_string_lossy().to_string();
        if !force_scan && (store.job_exists(&filepath).await? || store.encoded_file_exists(&filepath).await?) {
            continue;
        }

        store
            .insert_job(&filepath, "transcode", "pending", json!({}))
            .await?;
        jobs_inserted += 1;
    }

    Ok(MediaScanOutcome {
        candidates_seen,
        jobs_inserted,
    })
}

/// Default `probe_codec` for the internal scanner: shells out to
/// `ffprobe` for the first video stream's codec name.
pub fn ffprobe_video_codec(path: &Path) -> Option<String> {
    let output = std::process::Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=codec_name")
        .arg("-of")
        .arg("default=nw=1:nk=1")
        .arg(path.as_os_str())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let codec = String::from_utf8_lossy(&output.stdout).lines().next()?.trim().to_string();
    (!codec.is_empty()).then_some(codec)
}

fn collect_files(root: &Path, extensions: &HashSet<&str>, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extensions, out);
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if matches {
            out.push(path);
        }
    }
}

/// Plex scanner: enumerate libraries, reload each video for its primary
/// codec and on-disk path (spec.md §4.5).
pub async fn run_plex_scan(
    store: &Store,
    guard: &ScanGuard,
    plex: &PlexClient,
    skip_policy: &CodecSkipPolicy,
    force_scan: bool,
) -> Result<MediaScanOutcome> {
    let mut candidates_seen = 0u64;
    let mut jobs_inserted = 0u64;

    let libraries = plex.list_libraries().await?;
    let total = libraries.len() as u64;

    for (idx, library) in libraries.iter().enumerate() {
        if guard.is_cancelled() {
            guard.set_step("Scan cancelled by user.", idx as u64, total);
            break;
        }
        guard.set_step(format!("Scanning library {}", library.title), idx as u64, total);
        debug!(library = %library.title, "plex library scan");

        let items = plex.list_section_items(&library.key).await?;
        for item in items {
            candidates_seen += 1;

            let Some(filepath) = item.file_path else {
                warn!(title = %item.title, "plex item has no on-disk path, skipping");
                continue;
            };
            let Some(codec) = item.codec else {
                warn!(path = %filepath, "plex item has no codec reported, skipping");
                continue;
            };
            if skip_policy.should_skip(&codec) {
                continue;
            }
            if !force_scan && (store.job_exists(&filepath).await? || store.encoded_file_exists(&filepath).await?) {
                continue;
            }

            store
                .insert_job(&filepath, "transcode", "pending", json!({ "source": "plex", "plexSectionKey": library.key }))
                .await?;
            jobs_inserted += 1;
        }
    }

    Ok(MediaScanOutcome {
        candidates_seen,
        jobs_inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_set_always_includes_hevc_and_h265() {
        let policy = CodecSkipPolicy::default();
        assert!(policy.should_skip("hevc"));
        assert!(policy.should_skip("h265"));
        assert!(policy.should_skip("HEVC"));
    }

    #[test]
    fn av1_and_vp9_are_skipped_unless_allowed() {
        let policy = CodecSkipPolicy::default();
        assert!(policy.should_skip("av1"));
        assert!(policy.should_skip("vp9"));

        let policy = CodecSkipPolicy {
            allow_av1_reencode: true,
            allow_vp9_reencode: true,
        };
        assert!(!policy.should_skip("av1"));
        assert!(!policy.should_skip("vp9"));
    }

    #[test]
    fn h264_is_never_skipped() {
        let policy = CodecSkipPolicy::default();
        assert!(!policy.should_skip("h264"));
    }
}
