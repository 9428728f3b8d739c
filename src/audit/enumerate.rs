//! Source enumeration.
//!
//! Pages through the library or a playlist, following the cursor until the
//! service reports no further page. The total count is never assumed. Each
//! call to [`entries`] starts a fresh pass from offset zero.

use std::collections::HashSet;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};

use crate::catalog::Gateway;
use crate::error::{Error, Result, ResultExt};
use crate::model::{Source, SourceKind, Track};

/// Lazy `(position, track)` sequence in the source's native order.
pub fn entries<'a>(
    gateway: &'a Gateway,
    source: &'a Source,
) -> impl Stream<Item = Result<(usize, Track)>> + 'a {
    stream::try_unfold(Some(0usize), move |cursor| async move {
        let Some(offset) = cursor else {
            return Ok::<_, Error>(None);
        };
        let page = match source.playlist_id() {
            Some(playlist_id) => gateway.playlist_items_page(playlist_id, offset).await?,
            None => gateway.saved_tracks_page(offset).await?,
        };
        tracing::debug!("{source}: read {} items at offset {offset}", page.items.len());

        // A cursor that does not advance would loop forever
        let next = page.next_offset.filter(|next| *next > offset);
        let batch: Vec<(usize, Track)> = page
            .items
            .into_iter()
            .enumerate()
            .map(|(i, track)| (offset + i, track))
            .collect();
        Ok(Some((batch, next)))
    })
    .map_ok(|batch| stream::iter(batch.into_iter().map(Ok)))
    .try_flatten()
}

/// Read the whole source.
///
/// The library is a set: an id seen twice (pages can shift while being read)
/// is kept only at its first position.
pub async fn collect_all(gateway: &Gateway, source: &Source) -> Result<Vec<(usize, Track)>> {
    let mut seen = HashSet::new();
    let mut all = Vec::new();

    let mut stream = std::pin::pin!(entries(gateway, source));
    while let Some(entry) = stream.next().await {
        let (position, track) = entry.with_context(format!("reading {source}"))?;
        if source.kind == SourceKind::Library
            && !track.id.is_empty()
            && !seen.insert(track.id.clone())
        {
            tracing::debug!("Skipping duplicate library entry {}", track.id);
            continue;
        }
        all.push((position, track));
    }

    tracing::info!("Enumerated {} tracks from {source}", all.len());
    Ok(all)
}
