//! `JobQueue`: transactional claim/complete/fail of jobs (spec.md §4.4).
//!
//! This is a thin orchestration layer over `Store` — the atomicity lives
//! in the SQL (`FOR UPDATE SKIP LOCKED`), not here. `JobQueue` owns the
//! one rule that isn't expressible as a single query: the global
//! `pause_job_distribution` switch gates `claim_one_job` before it ever
//! touches the database.

use chrono::Duration as ChronoDuration;
use serde_json::Value;
use tracing::info;

use crate::db::store::{ClaimedJob, JobListFilters, StuckJob};
use crate::db::{models::Job, Store};
use crate::error::Result;
use crate::settings::Settings;

#[derive(Clone)]
pub struct JobQueue {
    store: Store,
}

impl JobQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a `transcode`/`cleanup` pending job. Idempotent on
    /// `filepath` (spec.md §8).
    pub async fn enqueue(&self, filepath: &str, job_type: &str, status: &str, metadata: Value) -> Result<()> {
        self.store.insert_job(filepath, job_type, status, metadata).await
    }

    pub async fn job_exists(&self, filepath: &str) -> Result<bool> {
        self.store.job_exists(filepath).await
    }

    /// `ClaimOneJob` never returns a job of type `Rename Job` or
    /// `Quality Mismatch` (spec.md §8) and returns nothing while global
    /// dispatch is paused.
    pub async fn claim_one(&self, hostname: &str) -> Result<Option<ClaimedJob>> {
        if Settings::new(&self.store).pause_job_distribution().await? {
            return Ok(None);
        }
        self.store.claim_one_job(hostname).await
    }

    pub async fn complete_transcode(&self, job_id: i64, original_size: i64, new_size: i64, hostname: &str) -> Result<()> {
        self.store
            .complete_transcode_job(job_id, original_size, new_size, hostname)
            .await
    }

    pub async fn complete_cleanup(&self, job_id: i64, hostname: &str) -> Result<()> {
        self.store.complete_cleanup_job(job_id, hostname).await
    }

    pub async fn fail(&self, job_id: i64, reason: Option<&str>, log: Option<&str>) -> Result<()> {
        self.store.fail_job(job_id, reason, log).await
    }

    pub async fn requeue(&self, job_id: i64) -> Result<()> {
        self.store.requeue_job(job_id).await
    }

    pub async fn delete(&self, job_id: i64) -> Result<()> {
        self.store.delete_job(job_id).await
    }

    pub async fn clear(&self) -> Result<u64> {
        info!("clearing job queue (pending + internal jobs)");
        self.store.clear_queue().await
    }

    pub async fn list(&self, filters: &JobListFilters, page: i64, page_size: i64) -> Result<Vec<Job>> {
        self.store.list_jobs(filters, page, page_size).await
    }

    pub async fn get(&self, job_id: i64) -> Result<Job> {
        self.store.get_job(job_id).await
    }

    pub async fn stuck_jobs(&self, freshness_window: ChronoDuration) -> Result<Vec<StuckJob>> {
        self.store.stuck_jobs(freshness_window).await
    }
}
