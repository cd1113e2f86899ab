pub mod migrate;
pub mod models;
pub mod store;

pub use migrate::Migrator;
pub use store::Store;

use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;
use crate::error::{CoreError, Result};

/// Build a connection pool for the configured database. Callers acquire
/// a connection per request/unit of work; nothing holds one across a
/// sleep or outbound HTTP call (spec.md §5).
pub async fn connect(config: &DatabaseConfig) -> Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.connection_string())
        .await
        .map_err(|e| CoreError::Fatal(format!("failed to connect to database: {e}")))
}
