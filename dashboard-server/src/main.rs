//! Entrypoint: load configuration, connect to Postgres, run migrations,
//! wire up the provider clients and background tasks, then serve the
//! axum router (SPEC_FULL.md §5).
//!
//! Grounded on `ferrex-server/src/main.rs`'s startup ordering
//! (config → tracing → database → schema → router → serve), adapted to
//! this system's background-task set and graceful-shutdown wiring.

mod error;
mod middleware;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dashboard_core::arr::{ArrJobProcessor, LidarrClient, PlexClient, RadarrClient, SonarrClient};
use dashboard_core::backup::BackupScheduler;
use dashboard_core::config::Config;
use dashboard_core::db::{self, Migrator, Store};
use dashboard_core::queue::JobQueue;
use dashboard_core::scan::{MediaScanDispatcher, ScanOrchestrator};
use dashboard_core::session::SessionRegistry;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_server=info,dashboard_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(bind_addr = %config.bind_addr, devmode = config.devmode, "configuration loaded");

    let pool = db::connect(&config.database).await?;
    let schema_version = Migrator::run(&pool).await?;
    tracing::info!(schema_version, "database migrated");

    let store = Store::new(pool);
    let queue = JobQueue::new(store.clone());
    let sessions = SessionRegistry::new(store.clone(), config.freshness_window);
    let scans = ScanOrchestrator::new();

    let plex = config
        .plex
        .as_ref()
        .map(|p| PlexClient::new(p.url.clone(), p.key.clone()))
        .transpose()?;
    let sonarr = config
        .sonarr
        .as_ref()
        .map(|p| SonarrClient::new(p.url.clone(), p.key.clone(), config.arr_ssl_verify))
        .transpose()?;
    let radarr = config
        .radarr
        .as_ref()
        .map(|p| RadarrClient::new(p.url.clone(), p.key.clone(), config.arr_ssl_verify))
        .transpose()?;
    let lidarr = config
        .lidarr
        .as_ref()
        .map(|p| LidarrClient::new(p.url.clone(), p.key.clone(), config.arr_ssl_verify))
        .transpose()?;

    let backups = BackupScheduler::new(
        config.database.clone(),
        config.backup_dir.clone().into(),
        store.clone(),
    );

    let scan_roots: Vec<std::path::PathBuf> = config.scan_roots.iter().map(std::path::PathBuf::from).collect();
    let dispatcher = MediaScanDispatcher::new(store.clone(), scans.clone(), plex.clone(), scan_roots);

    let config = Arc::new(config);
    let state = AppState::new(
        Arc::clone(&config),
        store.clone(),
        queue,
        sessions,
        scans,
        plex,
        sonarr.clone(),
        radarr.clone(),
        lidarr.clone(),
        backups.clone(),
    );
    state.mark_ready();

    let arr_processor = ArrJobProcessor::new(store, sonarr, radarr, lidarr).spawn();
    let backup_task = backups.spawn();
    let dispatcher_task = dispatcher.spawn();

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    arr_processor.abort();
    backup_task.abort();
    dispatcher_task.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
}
