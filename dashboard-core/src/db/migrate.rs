//! Schema migrator.
//!
//! Deliberately not `sqlx::migrate!`: spec.md §4.2 requires a fresh
//! database to be initialised directly at the target version (no replay
//! of every historical migration), gated by a single `schema_version`
//! row rather than sqlx's own ledger table. The health-check-before-act
//! shape is grounded on `PostgresQueueService::new` in the teacher.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::store::CONTROLLER_HOSTNAME;
use crate::error::{CoreError, Result};

/// One (version, sql) pair. `CURRENT_VERSION` is always `MIGRATIONS.last().0`.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("../../migrations/0001_init.sql"))];

pub struct Migrator;

impl Migrator {
    /// Apply every migration whose version is greater than the current
    /// `schema_version`. A brand-new database has no `schema_version`
    /// table at all; in that case we run every migration in order, which
    /// lands it directly on the target version. Migration failure is
    /// fatal: the caller should propagate the error and exit before
    /// opening the HTTP surface.
    pub async fn run(pool: &PgPool) -> Result<i32> {
        let schema_table_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = 'schema_version'
            )
            "#,
        )
        .fetch_one(pool)
        .await
        .map_err(|e| CoreError::Fatal(format!("schema introspection failed: {e}")))?;

        let current_version: i32 = if schema_table_exists {
            sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
                .fetch_optional(pool)
                .await
                .map_err(|e| CoreError::Fatal(format!("reading schema_version failed: {e}")))?
                .unwrap_or(1)
        } else {
            0
        };

        let mut applied = current_version;
        for (version, sql) in MIGRATIONS {
            if *version <= current_version {
                continue;
            }

            info!(version, "applying migration");
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| CoreError::Fatal(format!("begin migration tx failed: {e}")))?;

            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| CoreError::Fatal(format!("migration {version} failed: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO schema_version (id, version) VALUES (1, $1)
                ON CONFLICT (id) DO UPDATE SET version = EXCLUDED.version
                "#,
            )
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::Fatal(format!("bumping schema_version failed: {e}")))?;

            tx.commit()
                .await
                .map_err(|e| CoreError::Fatal(format!("commit migration {version} failed: {e}")))?;

            applied = *version;
        }

        if applied == current_version {
            warn!(version = applied, "no migrations applied, already current");
        }

        Self::seed_controller_node(pool).await?;

        Ok(applied)
    }

    /// Ensures the [`CONTROLLER_HOSTNAME`] sentinel node row exists, so
    /// `Store::claim_rename_jobs` always has a valid `assigned_to` target
    /// to satisfy the `jobs.assigned_to` foreign key without ever
    /// assigning an internal job to a real worker (spec.md §3, §8).
    async fn seed_controller_node(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nodes (hostname, session_token, version, status)
            VALUES ($1, '', 'controller', 'offline')
            ON CONFLICT (hostname) DO NOTHING
            "#,
        )
        .bind(CONTROLLER_HOSTNAME)
        .execute(pool)
        .await
        .map_err(|e| CoreError::Fatal(format!("seeding controller node failed: {e}")))?;
        Ok(())
    }
}
