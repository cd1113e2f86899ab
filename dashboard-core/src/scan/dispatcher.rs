//! `MediaScanDispatcher`: the scheduled media-scan timer (spec.md §4.5
//! "Scheduling of media scan"). A value of 0 for `rescan_delay_minutes`
//! disables the timer entirely — only manual triggers start scans.
//!
//! Grounded on the same interval-loop shape as `ArrJobProcessor` and
//! `BackupScheduler`; "is it due yet" is tracked via a bookkeeping row
//! in the `settings` table rather than an in-memory timestamp, so the
//! due-check survives a process restart.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info};

use crate::arr::PlexClient;
use crate::db::Store;
use crate::error::{CoreError, Result};
use crate::settings::Settings;

use super::media::{ffprobe_video_codec, run_internal_scan, run_plex_scan, CodecSkipPolicy};
use super::{ScanOrchestrator, ScanSource, ScanType};

const TICK_INTERVAL: Duration = Duration::from_secs(60);
const LAST_RUN_KEY: &str = "_last_media_scan_at";

pub struct MediaScanDispatcher {
    store: Store,
    scans: ScanOrchestrator,
    plex: Option<PlexClient>,
    scan_roots: Vec<PathBuf>,
}

impl MediaScanDispatcher {
    pub fn new(store: Store, scans: ScanOrchestrator, plex: Option<PlexClient>, scan_roots: Vec<PathBuf>) -> Self {
        Self {
            store,
            scans,
            plex,
            scan_roots,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(err) = self.tick_once().await {
                    error!(error = %err, "media scan dispatcher tick failed");
                }
            }
        })
    }

    async fn tick_once(&self) -> Result<()> {
        let settings = Settings::new(&self.store);
        let delay_minutes = settings.rescan_delay_minutes().await?;
        if delay_minutes <= 0 {
            return Ok(());
        }

        if !self.due(delay_minutes).await? {
            return Ok(());
        }

        let source = if self.plex.is_some() { ScanSource::Plex } else { ScanSource::Internal };
        let guard = match self.scans.try_start(source, ScanType::Media) {
            Ok(guard) => guard,
            Err(CoreError::Busy) => return Ok(()),
            Err(err) => return Err(err),
        };

        info!(delay_minutes, "scheduled media scan starting");
        let skip_policy = CodecSkipPolicy::default();
        match &self.plex {
            Some(plex) => {
                run_plex_scan(&self.store, &guard, plex, &skip_policy, false).await?;
            }
            None => {
                run_internal_scan(&self.store, &guard, &self.scan_roots, &skip_policy, false, ffprobe_video_codec).await?;
            }
        }
        drop(guard);

        self.store.set_setting(LAST_RUN_KEY, &Utc::now().timestamp().to_string()).await
    }

    async fn due(&self, delay_minutes: i64) -> Result<bool> {
        let last_run = self
            .store
            .get_setting(LAST_RUN_KEY)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        Ok(match last_run {
            Some(last) => Utc::now() - last >= ChronoDuration::minutes(delay_minutes),
            None => true,
        })
    }
}
