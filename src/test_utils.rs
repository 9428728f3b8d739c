//! Test utilities and fixtures for relink-auditor tests.
//!
//! Common builders for tracks, run configuration and a gateway over the
//! in-memory [`MockCatalog`], so individual tests only describe the remote
//! state they care about.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{catalog_track, fast_gateway};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let mock = Arc::new(MockCatalog::new("me"));
//!     mock.add_track(catalog_track("t1", "Song", "Artist"));
//!     let gateway = fast_gateway(mock.clone());
//!     // ... test logic
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::audit::RunContext;
use crate::catalog::traits::mocks::MockCatalog;
use crate::catalog::{BackoffPolicy, Gateway};
use crate::config::MatchingConfig;
use crate::market::Market;
use crate::model::{RunConfig, Source, Track};

/// A playable catalog track with sensible defaults.
///
/// Customize with struct update syntax:
///
/// ```ignore
/// let long = Track {
///     duration_ms: 400_000,
///     ..catalog_track("t1", "Song", "Artist")
/// };
/// ```
pub fn catalog_track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        uri: format!("spotify:track:{id}"),
        name: name.to_string(),
        artists: if artist.is_empty() {
            vec![]
        } else {
            vec![artist.to_string()]
        },
        album: "Album".to_string(),
        duration_ms: 200_000,
        is_playable: true,
        linked_from: None,
        is_local: false,
    }
}

/// The market used throughout the tests.
pub fn market() -> Market {
    Market::parse("BE").expect("BE is a valid market")
}

/// Dry-run configuration for `source` with no artist filter.
pub fn run_config(source: Source) -> RunConfig {
    RunConfig {
        dry_run: true,
        market: market(),
        artist_filter: None,
        source,
    }
}

/// Gateway over `mock` with millisecond backoff and three attempts.
pub fn fast_gateway(mock: Arc<MockCatalog>) -> Gateway {
    let policy = BackoffPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(4),
        jitter: false,
    };
    Gateway::with_policies(mock, policy.clone(), policy, 4)
}

/// Run context over `mock` with default matching settings.
pub fn run_context(mock: Arc<MockCatalog>, run: RunConfig) -> RunContext {
    RunContext::new(fast_gateway(mock), run, MatchingConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_track_defaults() {
        let track = catalog_track("t1", "Song", "Artist");
        assert_eq!(track.uri, "spotify:track:t1");
        assert_eq!(track.artists, vec!["Artist"]);
        assert!(track.is_playable);
        assert!(track.has_catalog_metadata());
    }

    #[test]
    fn test_empty_artist_yields_no_artists() {
        assert!(catalog_track("t1", "Song", "").artists.is_empty());
    }

    #[test]
    fn test_run_config_defaults_to_dry_run() {
        let config = run_config(Source::library("me"));
        assert!(config.dry_run);
        assert_eq!(config.market.as_str(), "BE");
    }
}
