//! Rate-limited gateway.
//!
//! Wraps any [`CatalogApi`] with:
//! - batching of reads and writes up to the platform's per-call caps
//! - one shared rate-limit state observed by every concurrent caller, so
//!   aggregate request volume (not per-worker volume) backs off
//! - retry of rate-limited calls (server-advised delay, or exponential
//!   backoff from 1s doubling to 60s, 5 attempts)
//! - retry of 5xx/network failures with jittered backoff
//!
//! Authentication failures are returned immediately and never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::traits::CatalogApi;
use super::{ApiError, BackoffPolicy, Page, PlaylistInfo, PositionedUri, UserProfile, limits};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::market::Market;
use crate::model::Track;

/// Result of a write call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The service reported a conflict: the target state already holds
    AlreadySatisfied,
}

/// Outcome of one chunk of a chunked write.
#[derive(Debug)]
pub struct ChunkResult<T> {
    pub items: Vec<T>,
    pub outcome: Result<WriteOutcome>,
}

/// Pause shared by every caller of one gateway.
#[derive(Default)]
struct Throttle {
    resume_at: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Wait until no rate-limit pause is in force.
    async fn wait(&self) {
        loop {
            let resume_at = *self.resume_at.lock();
            match resume_at {
                Some(at) if at > Instant::now() => tokio::time::sleep_until(at).await,
                _ => return,
            }
        }
    }

    /// Extend the pause so no caller proceeds for `delay`.
    fn hold(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut resume_at = self.resume_at.lock();
        if resume_at.is_none_or(|current| current < until) {
            *resume_at = Some(until);
        }
    }
}

/// Batching, retrying front for the catalog.
pub struct Gateway {
    api: Arc<dyn CatalogApi>,
    rate_limit: BackoffPolicy,
    transient: BackoffPolicy,
    concurrency: usize,
    throttle: Throttle,
}

impl Gateway {
    pub fn new(api: Arc<dyn CatalogApi>, config: &GatewayConfig) -> Self {
        Self::with_policies(
            api,
            config.rate_limit_policy(),
            config.transient_policy(),
            config.concurrency,
        )
    }

    pub fn with_policies(
        api: Arc<dyn CatalogApi>,
        rate_limit: BackoffPolicy,
        transient: BackoffPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            api,
            rate_limit,
            transient,
            concurrency: concurrency.max(1),
            throttle: Throttle::default(),
        }
    }

    /// Bound on concurrent classification/search batches.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run one remote call under the retry policy.
    async fn call<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let mut rate_limited = 0u32;
        let mut transient = 0u32;

        loop {
            self.throttle.wait().await;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err {
                ApiError::RateLimited { retry_after } => {
                    rate_limited += 1;
                    if !self.rate_limit.allows_retry(rate_limited) {
                        tracing::warn!("{label}: still rate limited after {rate_limited} attempts");
                        return Err(Error::RateLimited {
                            attempts: rate_limited,
                        });
                    }
                    let delay =
                        retry_after.unwrap_or_else(|| self.rate_limit.delay_for(rate_limited - 1));
                    tracing::warn!("{label}: rate limited, pausing all requests for {delay:?}");
                    self.throttle.hold(delay);
                }
                err if err.is_transient() => {
                    transient += 1;
                    if !self.transient.allows_retry(transient) {
                        tracing::warn!("{label}: giving up after {transient} attempts: {err}");
                        return Err(Error::Transient(format!("{label}: {err}")));
                    }
                    let delay = self.transient.delay_for(transient - 1);
                    tracing::debug!("{label}: {err}, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                err => return Err(err.into()),
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn current_user(&self) -> Result<UserProfile> {
        self.call("current user", || self.api.current_user()).await
    }

    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo> {
        self.call("playlist", || self.api.playlist(playlist_id)).await
    }

    /// Every playlist the user owns, following pagination to the end.
    pub async fn owned_playlists(&self, owner_id: &str) -> Result<Vec<PlaylistInfo>> {
        let mut owned = Vec::new();
        let mut offset = Some(0);
        while let Some(current) = offset {
            let page = self
                .call("user playlists", || {
                    self.api.user_playlists(current, limits::PLAYLISTS_PAGE)
                })
                .await?;
            offset = page.next_offset;
            owned.extend(page.items.into_iter().filter(|p| p.owner_id == owner_id));
        }
        Ok(owned)
    }

    /// Market-scoped lookup, batched by the lookup cap and aligned with `ids`.
    pub async fn lookup_tracks(&self, ids: &[String], market: Market) -> Result<Vec<Option<Track>>> {
        let mut resolved = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(limits::LOOKUP) {
            let batch = self
                .call("track lookup", || self.api.tracks(chunk, market))
                .await?;
            resolved.extend(batch);
        }
        Ok(resolved)
    }

    pub async fn search_tracks(&self, query: &str, market: Market, limit: usize) -> Result<Vec<Track>> {
        let limit = limit.clamp(1, limits::SEARCH);
        self.call("search", || self.api.search_tracks(query, market, limit))
            .await
    }

    pub async fn saved_tracks_page(&self, offset: usize) -> Result<Page<Track>> {
        self.call("saved tracks", || {
            self.api.saved_tracks(offset, limits::SAVED_PAGE)
        })
        .await
    }

    pub async fn playlist_items_page(&self, playlist_id: &str, offset: usize) -> Result<Page<Track>> {
        self.call("playlist items", || {
            self.api
                .playlist_items(playlist_id, offset, limits::PLAYLIST_PAGE)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Map a write result, turning conflicts into "already satisfied".
    fn write_outcome(label: &str, result: Result<()>) -> Result<WriteOutcome> {
        match result {
            Ok(()) => Ok(WriteOutcome::Applied),
            Err(Error::Conflict(msg)) => {
                tracing::warn!("{label}: treating conflict as already satisfied: {msg}");
                Ok(WriteOutcome::AlreadySatisfied)
            }
            Err(e) => Err(e),
        }
    }

    /// Save tracks to the library in chunks.
    pub async fn save_tracks(&self, ids: &[String]) -> Vec<ChunkResult<String>> {
        let mut results = Vec::new();
        for chunk in ids.chunks(limits::SAVED_WRITE) {
            let result = self.call("save tracks", || self.api.save_tracks(chunk)).await;
            results.push(ChunkResult {
                items: chunk.to_vec(),
                outcome: Self::write_outcome("save tracks", result),
            });
        }
        results
    }

    /// Remove tracks from the library in chunks.
    pub async fn unsave_tracks(&self, ids: &[String]) -> Vec<ChunkResult<String>> {
        let mut results = Vec::new();
        for chunk in ids.chunks(limits::SAVED_WRITE) {
            let result = self
                .call("remove saved tracks", || self.api.unsave_tracks(chunk))
                .await;
            results.push(ChunkResult {
                items: chunk.to_vec(),
                outcome: Self::write_outcome("remove saved tracks", result),
            });
        }
        results
    }

    /// Insert one item at `position`.
    pub async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        uri: &str,
        position: usize,
    ) -> Result<WriteOutcome> {
        let uris = [uri.to_string()];
        let result = self
            .call("insert playlist item", || {
                self.api.insert_playlist_items(playlist_id, &uris, position)
            })
            .await
            .map(|snapshot| tracing::debug!("playlist {playlist_id} now at {snapshot:?}"));
        Self::write_outcome("insert playlist item", result)
    }

    /// Remove positioned items in chunks.
    ///
    /// Items are removed from the highest position down, so indices of later
    /// chunks stay valid after earlier chunks are applied.
    pub async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        items: &[PositionedUri],
    ) -> Vec<ChunkResult<PositionedUri>> {
        let mut ordered = items.to_vec();
        ordered.sort_by(|a, b| b.position.cmp(&a.position));

        let mut results = Vec::new();
        for chunk in ordered.chunks(limits::PLAYLIST_WRITE) {
            let result = self
                .call("remove playlist items", || {
                    self.api.remove_playlist_items(playlist_id, chunk, None)
                })
                .await
                .map(|snapshot| tracing::debug!("playlist {playlist_id} now at {snapshot:?}"));
            results.push(ChunkResult {
                items: chunk.to_vec(),
                outcome: Self::write_outcome("remove playlist items", result),
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::traits::mocks::{MockCatalog, MockItem, uri_for};
    use crate::test_utils::{catalog_track, fast_gateway, market};

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_server_delay_then_succeeds() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next(
            "current_user",
            vec![ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(7)),
            }],
        );
        let gateway = Gateway::with_policies(
            mock.clone(),
            BackoffPolicy::default(),
            BackoffPolicy::default(),
            1,
        );

        let started = Instant::now();
        let user = gateway.current_user().await.unwrap();
        assert_eq!(user.id, "me");
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert_eq!(mock.call_count("current_user"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_after_five_attempts() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next(
            "current_user",
            vec![ApiError::RateLimited { retry_after: None }; 5],
        );
        let gateway = Gateway::with_policies(
            mock.clone(),
            BackoffPolicy::default(),
            BackoffPolicy::default(),
            1,
        );

        let started = Instant::now();
        let err = gateway.current_user().await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { attempts: 5 }));
        assert_eq!(mock.call_count("current_user"), 5);
        // 1 + 2 + 4 + 8 seconds of backoff between the five attempts
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_pause_is_shared() {
        let gateway = Gateway::with_policies(
            Arc::new(MockCatalog::new("me")),
            BackoffPolicy::default(),
            BackoffPolicy::default(),
            4,
        );
        gateway.throttle.hold(Duration::from_secs(3));

        let started = Instant::now();
        let (a, b) = tokio::join!(gateway.current_user(), gateway.current_user());
        assert!(a.is_ok() && b.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion_surfaces_transient() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next("tracks", vec![ApiError::Server { status: 502 }; 10]);
        let gateway = fast_gateway(mock.clone());

        let err = gateway
            .lookup_tracks(&["a".to_string()], market())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
        assert_eq!(mock.call_count("tracks"), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next("current_user", vec![ApiError::Unauthorized("expired".into())]);
        let gateway = fast_gateway(mock.clone());

        let err = gateway.current_user().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(mock.call_count("current_user"), 1);
    }

    #[tokio::test]
    async fn test_lookup_is_batched_by_cap() {
        let mock = Arc::new(MockCatalog::new("me"));
        let ids: Vec<String> = (0..120).map(|i| format!("t{i}")).collect();
        for id in &ids {
            mock.add_track(catalog_track(id, "Song", "Artist"));
        }
        let gateway = fast_gateway(mock.clone());

        let resolved = gateway.lookup_tracks(&ids, market()).await.unwrap();
        assert_eq!(resolved.len(), 120);
        assert!(resolved.iter().all(Option::is_some));
        assert_eq!(mock.call_count("tracks"), 3);
    }

    #[tokio::test]
    async fn test_owned_playlists_follow_pagination() {
        let mock = Arc::new(MockCatalog::new("me"));
        for i in 0..120 {
            let owner = if i % 3 == 0 { "someone" } else { "me" };
            mock.add_playlist(&format!("p{i}"), "List", owner, vec![]);
        }
        let gateway = fast_gateway(mock.clone());

        let owned = gateway.owned_playlists("me").await.unwrap();
        assert_eq!(owned.len(), 80);
        assert_eq!(mock.call_count("user_playlists"), 3);
    }

    #[tokio::test]
    async fn test_library_writes_are_chunked() {
        let mock = Arc::new(MockCatalog::new("me"));
        let gateway = fast_gateway(mock.clone());
        let ids: Vec<String> = (0..75).map(|i| format!("t{i}")).collect();

        let results = gateway.save_tracks(&ids).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].items.len(), 50);
        assert!(results.iter().all(|r| matches!(r.outcome, Ok(WriteOutcome::Applied))));
        assert_eq!(mock.library_ids().len(), 75);
    }

    #[tokio::test]
    async fn test_positional_removal_runs_high_to_low() {
        let mock = Arc::new(MockCatalog::new("me"));
        let items: Vec<MockItem> = (0..250).map(|i| MockItem::Catalog(format!("t{i}"))).collect();
        mock.add_playlist("p", "List", "me", items);
        let gateway = fast_gateway(mock.clone());

        // Every even position, across three chunks
        let removals: Vec<PositionedUri> = (0..250)
            .step_by(2)
            .map(|i| PositionedUri {
                uri: uri_for(&format!("t{i}")),
                position: i,
            })
            .collect();
        let results = gateway.remove_playlist_items("p", &removals).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome.is_ok()));

        let remaining = mock.playlist_ids("p");
        assert_eq!(remaining.len(), 125);
        assert!(remaining.iter().all(|id| {
            let n: usize = id[1..].parse().unwrap();
            n % 2 == 1
        }));
    }

    #[tokio::test]
    async fn test_conflict_is_already_satisfied() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.add_playlist("p", "List", "me", vec![MockItem::Catalog("a".into())]);
        let gateway = fast_gateway(mock.clone());

        let stale = [PositionedUri {
            uri: uri_for("zzz"),
            position: 0,
        }];
        let results = gateway.remove_playlist_items("p", &stale).await;
        assert!(matches!(
            results[0].outcome,
            Ok(WriteOutcome::AlreadySatisfied)
        ));
        assert_eq!(mock.playlist_ids("p"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_insert_playlist_item_is_one_call() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.add_playlist("p", "List", "me", vec![
            MockItem::Catalog("a".into()),
            MockItem::Catalog("b".into()),
        ]);
        let gateway = fast_gateway(mock.clone());

        let outcome = gateway.insert_playlist_item("p", &uri_for("n"), 1).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(mock.call_count("insert_playlist_items"), 1);
        assert_eq!(mock.playlist_ids("p"), vec!["a", "n", "b"]);
    }
}
