//! `AppState`: the shared handles every handler needs. Built once in
//! `main` and cloned (cheaply — everything inside is an `Arc` or a
//! `Clone`-cheap pool handle) into the axum router.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashboard_core::arr::{LidarrClient, PlexClient, RadarrClient, SonarrClient};
use dashboard_core::backup::BackupScheduler;
use dashboard_core::config::Config;
use dashboard_core::db::Store;
use dashboard_core::queue::JobQueue;
use dashboard_core::scan::ScanOrchestrator;
use dashboard_core::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub queue: JobQueue,
    pub sessions: SessionRegistry,
    pub scans: ScanOrchestrator,
    pub plex: Option<PlexClient>,
    pub sonarr: Option<SonarrClient>,
    pub radarr: Option<RadarrClient>,
    pub lidarr: Option<LidarrClient>,
    pub backups: BackupScheduler,
    /// Flips to `true` once `Migrator::run` completes; `/api/health`
    /// returns 503 until then (spec.md §4.8).
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Store,
        queue: JobQueue,
        sessions: SessionRegistry,
        scans: ScanOrchestrator,
        plex: Option<PlexClient>,
        sonarr: Option<SonarrClient>,
        radarr: Option<RadarrClient>,
        lidarr: Option<LidarrClient>,
        backups: BackupScheduler,
    ) -> Self {
        Self {
            config,
            store,
            queue,
            sessions,
            scans,
            plex,
            sonarr,
            radarr,
            lidarr,
            backups,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> dashboard_core::settings::Settings<'_> {
        dashboard_core::settings::Settings::new(&self.store)
    }
}
