//! Web API HTTP client
//!
//! One method per remote call, no retries: the gateway owns retry policy.
//! Every response is decoded into a DTO and immediately converted through
//! the adapter, so callers only receive domain types.
//!
//! Reads of the library and playlists are deliberately NOT market-scoped:
//! the audit needs the ids as stored, and a market would make the API
//! silently substitute relinked tracks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::traits::CatalogApi;
use super::{
    ApiError, Page, PlaylistInfo, PositionedUri, TokenProvider, UserProfile, adapter, dto,
};
use crate::market::Market;
use crate::model::Track;

const BASE_URL: &str = "https://api.spotify.com/v1";

/// Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl SpotifyClient {
    /// Create a client with a per-call timeout.
    pub fn new(tokens: Arc<dyn TokenProvider>, timeout: Duration) -> Result<Self, ApiError> {
        Self::with_base_url(tokens, timeout, BASE_URL)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token, send, and map non-success statuses.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let token = self.tokens.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), retry_after, &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// `Retry-After` is given in whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success status to an [`ApiError`].
fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> ApiError {
    let message = serde_json::from_str::<dto::ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        401 | 403 => ApiError::Unauthorized(format!("HTTP {status}: {message}")),
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        429 => ApiError::RateLimited { retry_after },
        500..=599 => ApiError::Server { status },
        _ => ApiError::Client { status, message },
    }
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let user: dto::UserObject = self.fetch(self.http_client.get(self.url("/me"))).await?;
        Ok(adapter::to_user(user))
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo, ApiError> {
        let url = self.url(&format!(
            "/playlists/{}?fields=id,name,owner(id,display_name),snapshot_id",
            urlencoding::encode(playlist_id)
        ));
        let playlist: dto::PlaylistObject = self.fetch(self.http_client.get(url)).await?;
        Ok(adapter::to_playlist_info(playlist))
    }

    async fn user_playlists(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<PlaylistInfo>, ApiError> {
        let url = self.url(&format!("/me/playlists?offset={offset}&limit={limit}"));
        let paging: dto::Paging<dto::PlaylistObject> = self.fetch(self.http_client.get(url)).await?;
        Ok(adapter::to_page(paging, offset, adapter::to_playlist_info))
    }

    async fn tracks(&self, ids: &[String], market: Market) -> Result<Vec<Option<Track>>, ApiError> {
        let url = self.url(&format!("/tracks?ids={}&market={}", ids.join(","), market));
        let response: dto::SeveralTracksResponse = self.fetch(self.http_client.get(url)).await?;
        adapter::to_lookup(response, ids)
    }

    async fn search_tracks(
        &self,
        query: &str,
        market: Market,
        limit: usize,
    ) -> Result<Vec<Track>, ApiError> {
        let url = self.url(&format!(
            "/search?q={}&type=track&market={}&limit={}",
            urlencoding::encode(query),
            market,
            limit
        ));
        let response: dto::SearchResponse = self.fetch(self.http_client.get(url)).await?;
        Ok(adapter::to_search_results(response))
    }

    async fn saved_tracks(&self, offset: usize, limit: usize) -> Result<Page<Track>, ApiError> {
        let url = self.url(&format!("/me/tracks?offset={offset}&limit={limit}"));
        let paging: dto::Paging<dto::SavedTrackObject> = self.fetch(self.http_client.get(url)).await?;
        Ok(adapter::to_page(paging, offset, adapter::to_saved_entry))
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Track>, ApiError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks?offset={offset}&limit={limit}&additional_types=track,episode",
            urlencoding::encode(playlist_id)
        ));
        let paging: dto::Paging<dto::PlaylistTrackObject> =
            self.fetch(self.http_client.get(url)).await?;
        Ok(adapter::to_page(paging, offset, adapter::to_playlist_entry))
    }

    async fn save_tracks(&self, ids: &[String]) -> Result<(), ApiError> {
        let request = self
            .http_client
            .put(self.url("/me/tracks"))
            .json(&json!({ "ids": ids }));
        self.execute(request).await.map(|_| ())
    }

    async fn unsave_tracks(&self, ids: &[String]) -> Result<(), ApiError> {
        let request = self
            .http_client
            .delete(self.url("/me/tracks"))
            .json(&json!({ "ids": ids }));
        self.execute(request).await.map(|_| ())
    }

    async fn insert_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: usize,
    ) -> Result<Option<String>, ApiError> {
        let url = self.url(&format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)));
        let request = self
            .http_client
            .post(url)
            .json(&json!({ "uris": uris, "position": position }));
        let response: dto::SnapshotResponse = self.fetch(request).await?;
        Ok(response.snapshot_id)
    }

    async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        items: &[PositionedUri],
        snapshot_id: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let url = self.url(&format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)));
        let tracks: Vec<_> = items
            .iter()
            .map(|item| json!({ "uri": item.uri, "positions": [item.position] }))
            .collect();
        let mut body = json!({ "tracks": tracks });
        if let Some(snapshot) = snapshot_id {
            body["snapshot_id"] = json!(snapshot);
        }
        let request = self.http_client.delete(url).json(&body);
        let response: dto::SnapshotResponse = self.fetch(request).await?;
        Ok(response.snapshot_id)
    }
}
