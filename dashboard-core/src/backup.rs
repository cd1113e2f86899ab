//! `BackupScheduler`: daily `pg_dump` snapshots with retention pruning
//! (spec.md §2/§6, SPEC_FULL.md §4.9).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use tokio::process::Command;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::db::Store;
use crate::error::{CoreError, Result};
use crate::settings::Settings;

const TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const STAMP_FORMAT: &str = "%Y%m%d.%H%M%S";

#[derive(Clone)]
pub struct BackupScheduler {
    database: DatabaseConfig,
    backup_dir: PathBuf,
    store: Store,
}

impl BackupScheduler {
    pub fn new(database: DatabaseConfig, backup_dir: PathBuf, store: Store) -> Self {
        Self {
            database,
            backup_dir,
            store,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once().await {
                    error!(error = %err, "backup run failed");
                }
            }
        })
    }

    /// Also used by the manual trigger endpoint (§6).
    pub async fn run_once(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| CoreError::Fatal(format!("creating backup dir failed: {e}")))?;

        let stamp = Utc::now().format("%Y%m%d.%H%M%S").to_string();
        let dump_path = self.backup_dir.join(format!("{stamp}.sql"));
        let archive_path = self.backup_dir.join(format!("{stamp}.tar.gz"));

        let status = Command::new("pg_dump")
            .arg("-h")
            .arg(&self.database.host)
            .arg("-p")
            .arg(self.database.port.to_string())
            .arg("-U")
            .arg(&self.database.user)
            .arg("-d")
            .arg(&self.database.name)
            .arg("-f")
            .arg(&dump_path)
            .env("PGPASSWORD", &self.database.password)
            .status()
            .await
            .map_err(|e| CoreError::Fatal(format!("pg_dump spawn failed: {e}")))?;

        if !status.success() {
            return Err(CoreError::Fatal(format!("pg_dump exited with {status}")));
        }

        let tar_status = Command::new("tar")
            .arg("-czf")
            .arg(&archive_path)
            .arg("-C")
            .arg(&self.backup_dir)
            .arg(dump_path.file_name().unwrap())
            .status()
            .await
            .map_err(|e| CoreError::Fatal(format!("tar spawn failed: {e}")))?;

        let _ = tokio::fs::remove_file(&dump_path).await;

        if !tar_status.success() {
            return Err(CoreError::Fatal(format!("tar exited with {tar_status}")));
        }

        info!(path = %archive_path.display(), "backup snapshot written");
        self.prune().await?;

        Ok(archive_path)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Listing for the backup list/download/delete endpoints (§6): every
    /// `*.tar.gz` archive under the backup directory, newest first.
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::Fatal(format!("reading backup dir failed: {e}"))),
        };

        let mut archives = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Fatal(format!("listing backup dir failed: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("gz") {
                archives.push(path);
            }
        }
        archives.sort();
        archives.reverse();
        Ok(archives)
    }

    /// Resolves a backup filename to a path strictly inside the backup
    /// directory, rejecting traversal attempts (spec.md §9 path safety).
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(CoreError::InvalidInput("invalid backup filename".into()));
        }
        let path = self.backup_dir.join(filename);
        if !path.starts_with(&self.backup_dir) {
            return Err(CoreError::InvalidInput("invalid backup filename".into()));
        }
        Ok(path)
    }

    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| CoreError::NotFound(format!("backup {filename}: {e}")))
    }

    /// Deletes archives older than `backup_retention_days` (spec.md §8
    /// Boundary), read live from `settings` so an operator's change takes
    /// effect on the very next run, same as every other setting.
    async fn prune(&self) -> Result<()> {
        let retention_days = Settings::new(&self.store).backup_retention_days().await?;
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);

        let mut entries = tokio::fs::read_dir(&self.backup_dir)
            .await
            .map_err(|e| CoreError::Fatal(format!("reading backup dir failed: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Fatal(format!("listing backup dir failed: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("gz") {
                continue;
            }
            let Some(stamp) = stamp_from_archive_name(&path) else {
                continue;
            };
            if stamp.and_utc() < cutoff {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    error!(path = %path.display(), error = %err, "failed to prune old backup");
                }
            }
        }

        Ok(())
    }
}

/// Parses the `YYYYMMDD.HHMMSS` stamp back out of a `{stamp}.tar.gz`
/// archive filename written by `run_once`.
fn stamp_from_archive_name(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?.strip_suffix(".tar")?;
    NaiveDateTime::parse_from_str(stem, STAMP_FORMAT).ok()
}
