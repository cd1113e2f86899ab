//! Typed process configuration.
//!
//! Mirrors the teacher's `ConfigLoader` shape: environment variables are
//! gathered first, an optional `.env` file is layered underneath them, and
//! the result is assembled into one `Config` struct with fallbacks applied
//! once here rather than scattered through call sites.

mod path_guard;

pub use path_guard::path_is_contained;

use std::env;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Database connection parameters (§6 `DB_HOST, DB_PORT, DB_USER,
/// DB_PASSWORD, DB_NAME`).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// Operator auth configuration (§6 `AUTH_ENABLED, OIDC_*, LOCAL_*`).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_enabled: bool,
    pub oidc_enabled: bool,
    pub oidc_issuer_url: Option<String>,
    pub oidc_client_id: Option<String>,
    pub oidc_client_secret: Option<String>,
    pub oidc_ssl_verify: bool,
    pub oidc_provider_name: Option<String>,
    pub local_login_enabled: bool,
    pub local_user: Option<String>,
    /// Decoded from the base64 `LOCAL_PASSWORD` env var.
    pub local_password: Option<String>,
}

/// Optional provider endpoint: left unset leaves the client `None` on
/// `AppState` rather than failing startup (spec.md §6 — providers are
/// each independently optional).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub key: String,
}

/// Runtime-wide configuration assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_key: String,
    pub auth: AuthConfig,
    pub arr_ssl_verify: bool,
    pub tz: String,
    pub devmode: bool,
    /// Freshness window for worker heartbeats. 5 minutes, unless
    /// `devmode` is set, in which case it is shortened for fast local
    /// iteration (the dev/prod split the teacher's config carries).
    pub freshness_window: Duration,
    pub plex: Option<ProviderConfig>,
    pub sonarr: Option<ProviderConfig>,
    pub radarr: Option<ProviderConfig>,
    pub lidarr: Option<ProviderConfig>,
    /// Internal scanner root set (`SCAN_ROOTS`, comma-separated).
    pub scan_roots: Vec<String>,
    pub backup_dir: String,
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the process environment, after attempting
    /// to layer in a `.env` file (missing file is not an error).
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(err) => return Err(CoreError::Fatal(format!("failed to read .env: {err}"))),
        }

        let database = DatabaseConfig {
            host: env_or("DB_HOST", "localhost"),
            port: env_or("DB_PORT", "5432")
                .parse()
                .map_err(|_| CoreError::Fatal("DB_PORT must be a port number".into()))?,
            user: env_or("DB_USER", "postgres"),
            password: env::var("DB_PASSWORD")
                .map_err(|_| CoreError::Fatal("DB_PASSWORD is required".into()))?,
            name: env_or("DB_NAME", "transcoder"),
        };

        let api_key = env::var("API_KEY")
            .map_err(|_| CoreError::Fatal("API_KEY is required".into()))?;

        let devmode = env_bool("DEVMODE", false);

        let auth = AuthConfig {
            auth_enabled: env_bool("AUTH_ENABLED", true),
            oidc_enabled: env_bool("OIDC_ENABLED", false),
            oidc_issuer_url: env::var("OIDC_ISSUER_URL").ok(),
            oidc_client_id: env::var("OIDC_CLIENT_ID").ok(),
            oidc_client_secret: env::var("OIDC_CLIENT_SECRET").ok(),
            oidc_ssl_verify: env_bool("OIDC_SSL_VERIFY", true),
            oidc_provider_name: env::var("OIDC_PROVIDER_NAME").ok(),
            local_login_enabled: env_bool("LOCAL_LOGIN_ENABLED", false),
            local_user: env::var("LOCAL_USER").ok(),
            local_password: env::var("LOCAL_PASSWORD")
                .ok()
                .and_then(|encoded| decode_base64_password(&encoded)),
        };

        let freshness_window = if devmode {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(5 * 60)
        };

        Ok(Self {
            database,
            api_key,
            auth,
            arr_ssl_verify: env_bool("ARR_SSL_VERIFY", true),
            tz: env_or("TZ", "UTC"),
            devmode,
            freshness_window,
            plex: provider_config("PLEX_URL", "PLEX_TOKEN"),
            sonarr: provider_config("SONARR_URL", "SONARR_API_KEY"),
            radarr: provider_config("RADARR_URL", "RADARR_API_KEY"),
            lidarr: provider_config("LIDARR_URL", "LIDARR_API_KEY"),
            scan_roots: env::var("SCAN_ROOTS")
                .ok()
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            backup_dir: env_or("BACKUP_DIR", "/var/backups/dashboard"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

fn provider_config(url_key: &str, secret_key: &str) -> Option<ProviderConfig> {
    let url = env::var(url_key).ok()?;
    let key = env::var(secret_key).ok()?;
    Some(ProviderConfig { url, key })
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn decode_base64_password(encoded: &str) -> Option<String> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
