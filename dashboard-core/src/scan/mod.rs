//! `ScanOrchestrator`: mutually-exclusive scanners, published progress
//! snapshot, cooperative cancellation (spec.md §4.5).
//!
//! Grounded on the teacher's single-writer `scan_progress_state` pattern
//! (`ferrex-server/src/infra/scan/scan_manager.rs`) and its cooperative
//! cancellation flag (`ferrex-core/src/scan/orchestration/dispatcher.rs`).
//! Re-architected per spec.md §9: an explicit state object with typed
//! `Start`/`Cancel`/`Snapshot` operations instead of module-level globals.

pub mod cleanup;
pub mod dispatcher;
pub mod media;
pub mod rename;

pub use dispatcher::MediaScanDispatcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Plex,
    Internal,
    Sonarr,
    Radarr,
    Lidarr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Media,
    Rename,
    Quality,
    Cleanup,
}

/// The published progress snapshot: read-mostly, single writer (the
/// active scanner), many concurrent readers (spec.md §4.5, §5).
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    pub is_running: bool,
    pub scan_source: Option<ScanSource>,
    pub scan_type: Option<ScanType>,
    pub current_step: String,
    pub total_steps: u64,
    pub progress: u64,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            is_running: false,
            scan_source: None,
            scan_type: None,
            current_step: String::new(),
            total_steps: 0,
            progress: 0,
        }
    }
}

/// A held exclusion. Dropping it releases the scanner lock; scanners
/// update the shared progress snapshot through it and poll
/// [`ScanGuard::is_cancelled`] at loop boundaries.
pub struct ScanGuard {
    orchestrator: ScanOrchestrator,
    _permit: tokio::sync::OwnedMutexGuard<()>,
}

impl ScanGuard {
    pub fn is_cancelled(&self) -> bool {
        self.orchestrator.cancel.load(Ordering::SeqCst)
    }

    pub fn set_step(&self, current_step: impl Into<String>, progress: u64, total_steps: u64) {
        let mut snapshot = self.orchestrator.progress.lock().unwrap();
        snapshot.current_step = current_step.into();
        snapshot.progress = progress;
        snapshot.total_steps = total_steps;
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let mut snapshot = self.orchestrator.progress.lock().unwrap();
        snapshot.is_running = false;
        self.orchestrator.cancel.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    running: Arc<AsyncMutex<()>>,
    progress: Arc<StdMutex<ScanProgress>>,
    cancel: Arc<AtomicBool>,
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOrchestrator {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AsyncMutex::new(())),
            progress: Arc::new(StdMutex::new(ScanProgress::default())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// At most one scan of any kind runs at a time (spec.md §4.5
    /// invariant). A second attempt while one is running returns `Busy`
    /// and immediately resets the progress snapshot (spec.md §7), rather
    /// than leaving a stale "running" state visible to the UI.
    pub fn try_start(&self, source: ScanSource, scan_type: ScanType) -> Result<ScanGuard> {
        let permit = match Arc::clone(&self.running).try_lock_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let mut snapshot = self.progress.lock().unwrap();
                *snapshot = ScanProgress::default();
                return Err(CoreError::Busy);
            }
        };

        {
            let mut snapshot = self.progress.lock().unwrap();
            *snapshot = ScanProgress {
                is_running: true,
                scan_source: Some(source),
                scan_type: Some(scan_type),
                current_step: "Starting scan...".to_string(),
                total_steps: 0,
                progress: 0,
            };
        }
        self.cancel.store(false, Ordering::SeqCst);

        info!(?source, ?scan_type, "scan started");

        Ok(ScanGuard {
            orchestrator: self.clone(),
            _permit: permit,
        })
    }

    /// Inspected cooperatively at per-item loop boundaries; on
    /// observation the scanner finishes its current unit, sets
    /// `current_step = "Scan cancelled by user."`, and releases the
    /// exclusion (spec.md §4.5, §5, §8 Boundary).
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ScanProgress {
        self.progress.lock().unwrap().clone()
    }

    pub fn mark_cancelled(&self) {
        let mut snapshot = self.progress.lock().unwrap();
        snapshot.current_step = "Scan cancelled by user.".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_scan_is_busy_while_first_runs() {
        let orchestrator = ScanOrchestrator::new();
        let guard = orchestrator.try_start(ScanSource::Internal, ScanType::Media).unwrap();

        let err = orchestrator
            .try_start(ScanSource::Sonarr, ScanType::Rename)
            .unwrap_err();
        assert!(matches!(err, CoreError::Busy));

        // Busy resets the progress snapshot immediately.
        let snapshot = orchestrator.snapshot();
        assert!(!snapshot.is_running);

        drop(guard);
    }

    #[tokio::test]
    async fn scan_can_start_again_after_previous_completes() {
        let orchestrator = ScanOrchestrator::new();
        {
            let _guard = orchestrator.try_start(ScanSource::Internal, ScanType::Media).unwrap();
        }
        assert!(orchestrator.try_start(ScanSource::Sonarr, ScanType::Rename).is_ok());
    }

    #[tokio::test]
    async fn cancellation_flag_is_observed_and_reset_on_drop() {
        let orchestrator = ScanOrchestrator::new();
        let guard = orchestrator.try_start(ScanSource::Internal, ScanType::Media).unwrap();
        assert!(!guard.is_cancelled());
        orchestrator.cancel();
        assert!(guard.is_cancelled());
        drop(guard);

        let guard2 = orchestrator.try_start(ScanSource::Internal, ScanType::Media).unwrap();
        assert!(!guard2.is_cancelled());
    }
}
