//! `Store`: the thin transactional repository over Postgres that every
//! other component in this crate goes through. One pool, many short
//! transactions — no connection is ever held across a sleep or an
//! outbound HTTP call (spec.md §5).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::db::models::{EncodedFile, FailedFile, Job, MediaSourceType, Node, SettingRow};
use crate::error::{CoreError, Result};

/// The hostname of the sentinel `nodes` row that owns internal
/// `Rename Job`/`Quality Mismatch` jobs while they're claimed — they
/// never leave the controller process for a worker to run, but every
/// row in `encoding` must still satisfy the non-null-`assigned_to`
/// invariant (spec.md §3, §8). Seeded by [`crate::db::Migrator::run`];
/// excluded from the operator-facing node list and from stuck-job
/// detection.
pub const CONTROLLER_HOSTNAME: &str = "__controller__";

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

/// A job claimed from the queue, ready to hand to a worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub filepath: String,
    pub job_type: String,
}

/// A job flagged as "stuck" (spec.md §4.4, §8 scenario 6): still
/// `encoding`, assigned to a worker that is live but has already moved
/// on to a later job.
#[derive(Debug, Clone)]
pub struct StuckJob {
    pub id: i64,
    pub filepath: String,
    pub assigned_to: String,
}

#[derive(Debug, Clone, Default)]
pub struct JobListFilters {
    pub status: Option<String>,
    pub job_type: Option<String>,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---------------------------------------------------------------
    // Nodes / SessionRegistry backing
    // ---------------------------------------------------------------

    /// Implements the three-way branch from spec.md §4.3: accept a fresh
    /// hostname, accept a stale one (replacing its token), accept a
    /// matching re-registration, or reject a live mismatch as a conflict.
    pub async fn upsert_node_on_register(
        &self,
        hostname: &str,
        session_token: &str,
        version: &str,
        freshness_window: ChronoDuration,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT session_token, last_heartbeat FROM nodes WHERE hostname = $1 FOR UPDATE",
        )
        .bind(hostname)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((stored_token, last_heartbeat)) = existing {
            let live = Utc::now() - last_heartbeat <= freshness_window;
            if live && stored_token != session_token {
                return Err(CoreError::RegistrationConflict(hostname.to_string()));
            }

            sqlx::query(
                r#"
                UPDATE nodes
                SET session_token = $2,
                    version = $3,
                    status = 'booting',
                    connected_at = now(),
                    last_heartbeat = now()
                WHERE hostname = $1
                "#,
            )
            .bind(hostname)
            .bind(session_token)
            .bind(version)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO nodes (hostname, session_token, version, status, connected_at, last_heartbeat)
                VALUES ($1, $2, $3, 'booting', now(), now())
                "#,
            )
            .bind(hostname)
            .bind(session_token)
            .bind(version)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Validates `(hostname, session_token)` for every worker-called
    /// endpoint (spec.md §4.3). Returns `SessionInvalid` on mismatch,
    /// `NotFound` if the hostname was never registered.
    pub async fn validate_session(&self, hostname: &str, session_token: &str) -> Result<()> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT session_token FROM nodes WHERE hostname = $1")
                .bind(hostname)
                .fetch_optional(&self.pool)
                .await?;

        match stored {
            Some(token) if token == session_token => Ok(()),
            Some(_) => Err(CoreError::SessionInvalid),
            None => Err(CoreError::SessionInvalid),
        }
    }

    /// Updates heartbeat columns only; never touches `session_token` or
    /// `connected_at` (spec.md §4.1).
    pub async fn heartbeat(
        &self,
        hostname: &str,
        status: Option<&str>,
        progress: Option<f64>,
        fps: Option<f64>,
        current_file: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE nodes
            SET last_heartbeat = now(),
                status = COALESCE($2, status),
                progress = COALESCE($3, progress),
                fps = COALESCE($4, fps),
                current_file = COALESCE($5, current_file)
            WHERE hostname = $1
            "#,
        )
        .bind(hostname)
        .bind(status)
        .bind(progress)
        .bind(fps)
        .bind(current_file)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_node_command(&self, hostname: &str, command: &str) -> Result<()> {
        let result = sqlx::query("UPDATE nodes SET command = $2 WHERE hostname = $1")
            .bind(hostname)
            .bind(command)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("node {hostname}")));
        }
        Ok(())
    }

    pub async fn delete_node(&self, hostname: &str) -> Result<()> {
        sqlx::query("DELETE FROM nodes WHERE hostname = $1")
            .bind(hostname)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Nodes list ordered by `hostname` ascending (spec.md §4.1). Excludes
    /// the [`CONTROLLER_HOSTNAME`] sentinel — it is not a worker and has
    /// no heartbeat/session of its own.
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE hostname <> $1 ORDER BY hostname ASC")
            .bind(CONTROLLER_HOSTNAME)
            .fetch_all(&self.pool)
            .await?;
        Ok(nodes)
    }

    pub async fn get_node(&self, hostname: &str) -> Result<Node> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE hostname = $1")
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("node {hostname}")))
    }

    // ---------------------------------------------------------------
    // Jobs / JobQueue backing
    // ---------------------------------------------------------------

    /// Insert a Job. Duplicate `filepath` is a silent no-op (natural-key
    /// conflict, spec.md §4.1/§8), not an error.
    pub async fn insert_job(&self, filepath: &str, job_type: &str, status: &str, metadata: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (filepath, job_type, status, metadata)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (filepath) DO NOTHING
            "#,
        )
        .bind(filepath)
        .bind(job_type)
        .bind(status)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn job_exists(&self, filepath: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE filepath = $1)")
                .bind(filepath)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Media scan skip condition (spec.md §4.5): a filepath already
    /// present in encoded history is skipped unless `force_scan`.
    pub async fn encoded_file_exists(&self, filepath: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM encoded_files WHERE filepath = $1)")
                .bind(filepath)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Atomically claims the single oldest eligible job: `status=pending`
    /// and `job_type` not in the internal set, using `FOR UPDATE SKIP
    /// LOCKED` so concurrent pollers never contend on the same row
    /// (grounded on `ferrex-core`'s orchestrator dequeue CTE).
    pub async fn claim_one_job(&self, hostname: &str) -> Result<Option<ClaimedJob>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String, String)> = sqlx::query_as(
            r#"
            WITH next AS (
                SELECT id
                FROM jobs
                WHERE status = 'pending'
                  AND job_type NOT IN ('Rename Job', 'Quality Mismatch')
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE jobs
            SET status = 'encoding', assigned_to = $1, updated_at = now()
            FROM next
            WHERE jobs.id = next.id
            RETURNING jobs.id, jobs.filepath, jobs.job_type
            "#,
        )
        .bind(hostname)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.map(|(id, filepath, job_type)| ClaimedJob {
            id,
            filepath,
            job_type,
        }))
    }

    /// Claims up to `limit` internal `Rename Job / pending` rows for the
    /// `ArrJobProcessor`'s periodic drain. Uses the same skip-locked
    /// shape as `claim_one_job`, assigning to the [`CONTROLLER_HOSTNAME`]
    /// sentinel rather than a worker hostname — these never leave the
    /// controller process, but `encoding` rows must still carry a
    /// non-null `assigned_to` (spec.md §3, §8).
    pub async fn claim_rename_jobs(&self, limit: i64) -> Result<Vec<Job>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, Job>(
            r#"
            WITH next AS (
                SELECT id
                FROM jobs
                WHERE status = 'pending' AND job_type = 'Rename Job'
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $1
            )
            UPDATE jobs
            SET status = 'encoding', assigned_to = $2, updated_at = now()
            FROM next
            WHERE jobs.id = next.id
            RETURNING jobs.*
            "#,
        )
        .bind(limit)
        .bind(CONTROLLER_HOSTNAME)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }

    /// `transcode`/`cleanup` completion: append history, delete the job.
    pub async fn complete_transcode_job(
        &self,
        job_id: i64,
        original_size: i64,
        new_size: i64,
        worker_hostname: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let filepath: Option<String> = sqlx::query_scalar("SELECT filepath FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(filepath) = filepath else {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        };

        sqlx::query(
            r#"
            INSERT INTO encoded_files (filepath, original_size, new_size, worker_hostname)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&filepath)
        .bind(original_size)
        .bind(new_size)
        .bind(worker_hostname)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(job_id, %filepath, "transcode job completed");
        Ok(())
    }

    /// `cleanup` completion: a zero-size `EncodedFile` row, then delete.
    pub async fn complete_cleanup_job(&self, job_id: i64, worker_hostname: &str) -> Result<()> {
        self.complete_transcode_job(job_id, 0, 0, worker_hostname).await
    }

    /// Internal job completion (`Rename Job`, `Quality Mismatch` is never
    /// dispatched but rename jobs complete via `ArrJobProcessor`): mark
    /// `completed`, keep the row.
    pub async fn complete_internal_job(&self, job_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', updated_at = now() WHERE id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    /// Any `failed` terminal update: append a `FailedFile` row, mark the
    /// job `failed` (kept, not deleted, so operators can requeue).
    pub async fn fail_job(&self, job_id: i64, reason: Option<&str>, log: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT filepath, job_type FROM jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((filepath, job_type)) = row else {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        };

        sqlx::query(
            "INSERT INTO failed_files (filepath, job_type, reason, log) VALUES ($1, $2, $3, $4)",
        )
        .bind(&filepath)
        .bind(&job_type)
        .bind(reason)
        .bind(log)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE jobs SET status = 'failed', updated_at = now() WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        warn!(job_id, %filepath, reason, "job failed");
        Ok(())
    }

    /// Requeue a failed or orphaned job: clear `assigned_to`, reset to
    /// `pending`, bump `updated_at`. Does not touch the failure log
    /// (spec.md §9 Open Question: source leaves it for audit).
    pub async fn requeue_job(&self, job_id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', assigned_to = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    pub async fn delete_job(&self, job_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    /// Delete all `pending` jobs plus all internal-type jobs regardless
    /// of status — they are cheap to recompute (spec.md §4.4).
    pub async fn clear_queue(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status = 'pending' OR job_type IN ('Rename Job', 'Quality Mismatch')
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Jobs list ordered by the custom status priority then
    /// `created_at desc` (spec.md §4.1).
    pub async fn list_jobs(&self, filters: &JobListFilters, page: i64, page_size: i64) -> Result<Vec<Job>> {
        let offset = page.max(0) * page_size.max(1);
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR job_type = $2)
            ORDER BY
                CASE status
                    WHEN 'encoding' THEN 1
                    WHEN 'pending' THEN 2
                    WHEN 'failed' THEN 3
                    ELSE 4
                END,
                created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filters.status)
        .bind(&filters.job_type)
        .bind(page_size.max(1))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Job> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("job {job_id}")))
    }

    /// Derived "stuck job" detection (spec.md §4.4, §8 scenario 6): an
    /// `encoding` job whose assigned worker is live and has claimed a
    /// strictly later job. Computed entirely in SQL, not stored. Internal
    /// job types are excluded: they're claimed onto the
    /// [`CONTROLLER_HOSTNAME`] sentinel, not a worker, and the
    /// "stuck" heuristic doesn't apply to them.
    pub async fn stuck_jobs(&self, freshness_window: ChronoDuration) -> Result<Vec<StuckJob>> {
        let cutoff = Utc::now() - freshness_window;
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT j.id, j.filepath, j.assigned_to
            FROM jobs j
            JOIN nodes n ON n.hostname = j.assigned_to
            WHERE j.status = 'encoding'
              AND j.job_type NOT IN ('Rename Job', 'Quality Mismatch')
              AND n.last_heartbeat >= $1
              AND EXISTS (
                  SELECT 1 FROM jobs later
                  WHERE later.assigned_to = j.assigned_to
                    AND later.status = 'encoding'
                    AND later.id > j.id
              )
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, filepath, assigned_to)| StuckJob {
                id,
                filepath,
                assigned_to,
            })
            .collect())
    }

    pub async fn list_history(&self) -> Result<Vec<EncodedFile>> {
        let rows = sqlx::query_as::<_, EncodedFile>(
            "SELECT * FROM encoded_files ORDER BY completed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn clear_history(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM encoded_files").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn list_failures(&self) -> Result<Vec<FailedFile>> {
        let rows = sqlx::query_as::<_, FailedFile>(
            "SELECT * FROM failed_files ORDER BY failed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn clear_failures(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM failed_files").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    // ---------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------

    /// Uncached read: always hits the database so operator changes are
    /// effective immediately (spec.md §5).
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<SettingRow> =
            sqlx::query_as("SELECT key, value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_settings(&self) -> Result<Vec<SettingRow>> {
        let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Media source classification
    // ---------------------------------------------------------------

    pub async fn upsert_media_source_type(
        &self,
        source_name: &str,
        scanner_type: &str,
        media_type: &str,
        is_hidden: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_source_types (source_name, scanner_type, media_type, is_hidden)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_name, scanner_type)
            DO UPDATE SET media_type = EXCLUDED.media_type, is_hidden = EXCLUDED.is_hidden
            "#,
        )
        .bind(source_name)
        .bind(scanner_type)
        .bind(media_type)
        .bind(is_hidden)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_media_source_types(&self) -> Result<Vec<MediaSourceType>> {
        let rows = sqlx::query_as::<_, MediaSourceType>("SELECT * FROM media_source_types")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Operator sessions (bearer cookie validation only; login itself is
    // out of scope, spec.md §1)
    // ---------------------------------------------------------------

    pub async fn create_operator_session(&self, token: &str, ttl: ChronoDuration) -> Result<()> {
        sqlx::query("INSERT INTO operator_sessions (token, expires_at) VALUES ($1, $2)")
            .bind(token)
            .bind(Utc::now() + ttl)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn validate_operator_session(&self, token: &str) -> Result<bool> {
        let expires_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT expires_at FROM operator_sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(expires_at.is_some_and(|exp| exp > Utc::now()))
    }
}
