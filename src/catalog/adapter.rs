//! Adapter layer: Convert Web API DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! Every optional field is resolved here so the classifier and matcher work
//! with strict [`Track`] values only.

use super::{ApiError, Page, PlaylistInfo, UserProfile, dto};
use crate::model::Track;

/// Convert a track object into a domain track.
///
/// Items that are not catalog tracks (local files, podcast episodes) are
/// flagged `is_local` so they never reach lookup or search.
pub fn to_track(object: dto::TrackObject) -> Track {
    let is_episode = object
        .object_type
        .as_deref()
        .is_some_and(|t| !t.eq_ignore_ascii_case("track"));

    let id = object.id.unwrap_or_default();
    let uri = object
        .uri
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| if id.is_empty() { String::new() } else { format!("spotify:track:{id}") });

    Track {
        uri,
        name: object.name.unwrap_or_default(),
        artists: object
            .artists
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect(),
        album: object.album.and_then(|a| a.name).unwrap_or_default(),
        duration_ms: object.duration_ms.unwrap_or(0),
        // Without a market the API omits the flag; absence means unknown, and
        // only market-scoped lookups are trusted for playability.
        is_playable: object.is_playable.unwrap_or(false),
        linked_from: object
            .linked_from
            .and_then(|l| l.id)
            .filter(|linked| *linked != id),
        is_local: object.is_local || is_episode,
        id,
    }
}

/// Convert a playlist entry; null entries become empty non-catalog tracks.
pub fn to_playlist_entry(item: dto::PlaylistTrackObject) -> Track {
    match item.track {
        Some(track) => {
            let mut track = to_track(track);
            track.is_local |= item.is_local;
            track
        }
        None => Track {
            is_local: item.is_local,
            ..Track::default()
        },
    }
}

/// Convert a saved-track entry.
pub fn to_saved_entry(item: dto::SavedTrackObject) -> Track {
    item.track.map(to_track).unwrap_or_default()
}

/// Convert a page, computing the next offset from the cursor.
pub fn to_page<T, U>(paging: dto::Paging<T>, offset: usize, convert: impl Fn(T) -> U) -> Page<U> {
    let count = paging.items.len();
    let next_offset = match paging.next {
        Some(_) if count > 0 => Some(offset + count),
        _ => None,
    };
    Page {
        items: paging.items.into_iter().map(convert).collect(),
        next_offset,
    }
}

/// Align a batch lookup response with the requested ids.
///
/// The API answers positionally with `null` for unknown ids; anything else
/// is a contract violation.
pub fn to_lookup(
    response: dto::SeveralTracksResponse,
    requested: &[String],
) -> Result<Vec<Option<Track>>, ApiError> {
    if response.tracks.len() != requested.len() {
        return Err(ApiError::Parse(format!(
            "lookup returned {} entries for {} ids",
            response.tracks.len(),
            requested.len()
        )));
    }
    Ok(response
        .tracks
        .into_iter()
        .zip(requested)
        .map(|(entry, requested_id)| {
            entry.map(|object| {
                let mut track = to_track(object);
                // A redirect may be reported only through a changed id
                if track.linked_from.is_none() && !track.id.is_empty() && track.id != *requested_id {
                    track.linked_from = Some(requested_id.clone());
                }
                track
            })
        })
        .collect())
}

/// Convert search results, dropping null and non-catalog entries.
pub fn to_search_results(response: dto::SearchResponse) -> Vec<Track> {
    response
        .tracks
        .map(|paging| paging.items)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(to_track)
        .filter(Track::has_catalog_metadata)
        .collect()
}

pub fn to_user(user: dto::UserObject) -> UserProfile {
    UserProfile {
        display_name: user.display_name.unwrap_or_else(|| user.id.clone()),
        id: user.id,
    }
}

pub fn to_playlist_info(playlist: dto::PlaylistObject) -> PlaylistInfo {
    PlaylistInfo {
        name: playlist.name.unwrap_or_else(|| playlist.id.clone()),
        id: playlist.id,
        owner_id: playlist.owner.id,
        snapshot_id: playlist.snapshot_id,
    }
}
