//! Typed settings accessors.
//!
//! Grounded on the teacher's `Config`/loader split ("duck-typed settings
//! dictionary" → typed accessors that apply fallbacks once at the
//! boundary, spec.md §9). Every read hits the database directly — no
//! cache layer — so operator changes in the settings table take effect
//! immediately.

use crate::db::Store;
use crate::error::Result;

pub struct Settings<'a> {
    store: &'a Store,
}

impl<'a> Settings<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn get_string(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.store.get_setting(key).await?.unwrap_or_else(|| default.to_string()))
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let raw = self.store.get_setting(key).await?;
        Ok(match raw {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            None => default,
        })
    }

    pub async fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        let raw = self.store.get_setting(key).await?;
        Ok(match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
            Some(v) => v,
            None => default,
        })
    }

    pub async fn get_duration_minutes(&self, key: &str, default_minutes: i64) -> Result<std::time::Duration> {
        let minutes = self.get_int(key, default_minutes).await?.max(0);
        Ok(std::time::Duration::from_secs((minutes as u64) * 60))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set_setting(key, value).await
    }

    /// `backup_retention_days`: clamped to `[1, 365]`; non-integer values
    /// default to 7 (spec.md §7 InvalidInput policy, §8 Boundary).
    pub async fn backup_retention_days(&self) -> Result<i64> {
        let raw = self.store.get_setting("backup_retention_days").await?;
        let value = raw.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(7);
        Ok(value.clamp(1, 365))
    }

    /// `rescan_delay_minutes`: 0 disables the timer (manual triggers
    /// only); spec.md §4.5.
    pub async fn rescan_delay_minutes(&self) -> Result<i64> {
        self.get_int("rescan_delay_minutes", 0).await
    }

    pub async fn pause_job_distribution(&self) -> Result<bool> {
        self.get_bool("pause_job_distribution", false).await
    }

    /// Gates `PostCompleteHook`'s Sonarr/Radarr/Lidarr rescan-then-rename
    /// step; off by default (spec.md §4.7 step 2).
    pub async fn auto_rename_after_transcode(&self) -> Result<bool> {
        self.get_bool("auto_rename_after_transcode", false).await
    }
}

// Clamping logic is exercised against a live database in
// dashboard-core/tests/settings.rs.
