//! Catalog access - everything that talks to the streaming service.
//!
//! # Architecture
//!
//! Same layering as any external API integration in this codebase:
//! - **DTOs** (`dto.rs`) - exact API response shapes
//! - **Adapter** (`adapter.rs`) - the only DTO to domain conversion point
//! - **Client** (`client.rs`) - HTTP client, one remote call per method
//! - **Auth** (`auth.rs`) - bearer token providers
//! - **Traits** (`traits.rs`) - [`CatalogApi`], the abstract capability surface
//! - **Backoff** (`backoff.rs`) - retry schedule object
//! - **Gateway** (`gateway.rs`) - batching, shared rate-limit state and retry
//!   on top of any [`CatalogApi`]
//!
//! Untyped response data never leaves this module: callers only see
//! [`crate::model::Track`] and the small types below.

pub mod adapter;
pub mod auth;
pub mod backoff;
pub mod client;
pub mod dto;
pub mod gateway;
pub mod traits;

use std::time::Duration;

pub use auth::{RefreshingToken, StaticToken, TokenProvider};
pub use backoff::BackoffPolicy;
pub use client::SpotifyClient;
pub use gateway::{ChunkResult, Gateway, WriteOutcome};
pub use traits::CatalogApi;

/// Platform per-call item caps.
pub mod limits {
    /// Ids per track lookup
    pub const LOOKUP: usize = 50;
    /// Items per saved-tracks page
    pub const SAVED_PAGE: usize = 50;
    /// Items per playlist page
    pub const PLAYLIST_PAGE: usize = 100;
    /// Items per user-playlists page
    pub const PLAYLISTS_PAGE: usize = 50;
    /// Ids per saved-tracks write
    pub const SAVED_WRITE: usize = 50;
    /// Items per playlist write
    pub const PLAYLIST_WRITE: usize = 100;
    /// Results per search call
    pub const SEARCH: usize = 50;
}

/// Outcome of a single remote call, before any retry policy is applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("request rejected: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    /// 5xx and network failures, retried with jittered backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Network(_))
    }
}

/// One page of a paginated read.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Offset of the next page; `None` once the cursor is exhausted
    pub next_offset: Option<usize>,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
}

/// Playlist header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub snapshot_id: Option<String>,
}

/// A playlist item addressed by URI and current index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedUri {
    pub uri: String,
    pub position: usize,
}
