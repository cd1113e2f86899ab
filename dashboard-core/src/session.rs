//! `SessionRegistry`: at-most-one active worker per hostname, impostor
//! rejection (spec.md §4.3).

use chrono::Duration as ChronoDuration;
use tracing::info;

use crate::db::Store;
use crate::error::Result;

#[derive(Clone)]
pub struct SessionRegistry {
    store: Store,
    freshness_window: ChronoDuration,
}

impl SessionRegistry {
    pub fn new(store: Store, freshness_window: std::time::Duration) -> Self {
        Self {
            store,
            freshness_window: ChronoDuration::from_std(freshness_window)
                .unwrap_or_else(|_| ChronoDuration::minutes(5)),
        }
    }

    /// Register or re-register a worker identity. Succeeds for a
    /// brand-new hostname, a stale one (silently replacing the stored
    /// token), or a matching re-registration; rejects with
    /// `RegistrationConflict` when a live session is held by a different
    /// token (spec.md §4.3, §8 scenarios 1–2).
    pub async fn register(&self, hostname: &str, session_token: &str, version: &str) -> Result<()> {
        self.store
            .upsert_node_on_register(hostname, session_token, version, self.freshness_window)
            .await?;
        info!(hostname, version, "worker registered");
        Ok(())
    }

    /// Validates `{hostname, session_token}` for any worker-authenticated
    /// call. API-key validation happens one layer above this, in the
    /// HTTP auth middleware, so a bad key never reaches here.
    pub async fn validate(&self, hostname: &str, session_token: &str) -> Result<()> {
        self.store.validate_session(hostname, session_token).await
    }
}
