//! Trait definition for the catalog capability surface.
//!
//! [`CatalogApi`] is one remote call per method, with no retry or batching;
//! the [`Gateway`](super::Gateway) adds those on top. Production code uses
//! [`SpotifyClient`](super::SpotifyClient); tests substitute
//! [`mocks::MockCatalog`].

use async_trait::async_trait;

use super::{ApiError, Page, PlaylistInfo, PositionedUri, UserProfile};
use crate::market::Market;
use crate::model::Track;

/// Raw catalog operations.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// The authenticated user.
    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    /// Playlist header by id.
    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo, ApiError>;

    /// One page of the user's playlists.
    async fn user_playlists(&self, offset: usize, limit: usize)
    -> Result<Page<PlaylistInfo>, ApiError>;

    /// Market-scoped lookup, aligned with `ids`; `None` for unknown ids.
    async fn tracks(&self, ids: &[String], market: Market) -> Result<Vec<Option<Track>>, ApiError>;

    /// Market-scoped track search.
    async fn search_tracks(
        &self,
        query: &str,
        market: Market,
        limit: usize,
    ) -> Result<Vec<Track>, ApiError>;

    /// One page of saved tracks, as stored (no market relinking).
    async fn saved_tracks(&self, offset: usize, limit: usize) -> Result<Page<Track>, ApiError>;

    /// One page of playlist items, as stored (no market relinking).
    async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Track>, ApiError>;

    /// Save tracks to the library.
    async fn save_tracks(&self, ids: &[String]) -> Result<(), ApiError>;

    /// Remove tracks from the library.
    async fn unsave_tracks(&self, ids: &[String]) -> Result<(), ApiError>;

    /// Insert `uris` as a block starting at `position`; returns the new snapshot.
    async fn insert_playlist_items(
        &self,
        playlist_id: &str,
        uris: &[String],
        position: usize,
    ) -> Result<Option<String>, ApiError>;

    /// Remove specific occurrences; positions refer to the current snapshot.
    async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        items: &[PositionedUri],
        snapshot_id: Option<&str>,
    ) -> Result<Option<String>, ApiError>;
}
