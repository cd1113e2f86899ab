//! HTTP clients for the three external media managers (Sonarr, Radarr,
//! Lidarr) plus Plex, and the periodic `ArrJobProcessor` drain
//! (spec.md §4.6).

pub mod lidarr;
pub mod plex;
pub mod processor;
pub mod radarr;
pub mod sonarr;

pub use lidarr::LidarrClient;
pub use plex::PlexClient;
pub use processor::ArrJobProcessor;
pub use radarr::RadarrClient;
pub use sonarr::SonarrClient;

use std::time::Duration;

/// Settle delay: the fixed wait between commanding a provider to rescan
/// and querying its rename API (spec.md §4.5, §4.7, Glossary).
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Outbound HTTP timeout budget (spec.md §5: 5-20s depending on the
/// operation; we use a single conservative value for every arr call).
pub const ARR_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

fn build_client(ssl_verify: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(ARR_HTTP_TIMEOUT)
        .danger_accept_invalid_certs(!ssl_verify)
        .build()
}
