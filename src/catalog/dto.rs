//! Web API Data Transfer Objects
//!
//! These types match what the streaming service's Web API returns.
//! Every field the API may omit or null is an `Option` or has a serde
//! default. DO NOT use these types outside the catalog module - convert
//! to domain types in `adapter.rs`.

use serde::{Deserialize, Serialize};

/// Full track object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackObject {
    /// Null for local files
    pub id: Option<String>,
    pub uri: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: Option<AlbumObject>,
    pub duration_ms: Option<u64>,
    /// Present only when a market was supplied
    pub is_playable: Option<bool>,
    /// Present when the catalog relinked the requested track
    pub linked_from: Option<LinkedFrom>,
    #[serde(default)]
    pub is_local: bool,
    /// "track" or "episode"
    #[serde(rename = "type")]
    pub object_type: Option<String>,
}

/// Simplified artist
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistObject {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Simplified album
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumObject {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Original track a relinked result stands in for
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkedFrom {
    pub id: Option<String>,
    pub uri: Option<String>,
}

/// `GET /tracks?ids=...` response; entries are null for unknown ids
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeveralTracksResponse {
    #[serde(default)]
    pub tracks: Vec<Option<TrackObject>>,
}

/// Generic paging object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// URL of the next page, null on the last page
    pub next: Option<String>,
    pub offset: Option<u32>,
    pub total: Option<u32>,
}

/// Saved-track entry in `GET /me/tracks`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SavedTrackObject {
    pub added_at: Option<String>,
    pub track: Option<TrackObject>,
}

/// Playlist entry in `GET /playlists/{id}/tracks`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistTrackObject {
    pub added_at: Option<String>,
    #[serde(default)]
    pub is_local: bool,
    /// Null for removed or unavailable entries
    pub track: Option<TrackObject>,
}

/// `GET /search?type=track` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub tracks: Option<Paging<Option<TrackObject>>>,
}

/// `GET /me` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserObject {
    pub id: String,
    pub display_name: Option<String>,
}

/// Playlist owner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OwnerObject {
    pub id: String,
    pub display_name: Option<String>,
}

/// Simplified playlist in `GET /me/playlists` and `GET /playlists/{id}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistObject {
    pub id: String,
    pub name: Option<String>,
    pub owner: OwnerObject,
    pub snapshot_id: Option<String>,
}

/// Response of playlist add/remove
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotResponse {
    pub snapshot_id: Option<String>,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

/// Error body: `{"error": {"status": 404, "message": "..."}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub status: Option<u16>,
    pub message: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs accept what the real API returns.
// ============================================================================
