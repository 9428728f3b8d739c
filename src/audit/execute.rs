//! Mutation execution.
//!
//! Library: one chunked save of the new ids, then one chunked removal of the
//! old ids whose replacement was saved. Ids already in the library as OK
//! records are not saved again.
//!
//! Playlist: strictly sequential, in ascending original position. Each new
//! track is inserted directly before its old one at `position + offset`
//! (offset grows by one), then every old track of the chunk is removed in one
//! positional call at its shifted index (offset shrinks by the number
//! removed). Items between replaced positions never move relative to each
//! other, so the order of untouched tracks is preserved.
//!
//! A conflicting removal is not taken at its word: the playlist is re-read
//! and any old track still at its index is recorded as a failure, leaving
//! the offset untouched for it.

use std::collections::{HashMap, HashSet};

use crate::catalog::{ChunkResult, Gateway, PositionedUri, WriteOutcome, limits};
use crate::error::Result;
use crate::model::{
    AuditRecord, AuditStatus, FailureKind, MutationOutcome, Source, SourceKind, reason,
};

use super::plan::PlannedPair;

/// Result of one half of a pair; errors are kept as their message.
type Step = std::result::Result<WriteOutcome, String>;

/// Apply `pairs` to the source and record each pair's outcome on its record.
///
/// Write failures are recorded per record; only fatal errors are returned.
pub async fn apply(
    gateway: &Gateway,
    source: &Source,
    records: &mut [AuditRecord],
    pairs: &[PlannedPair],
) -> Result<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    tracing::info!("Applying {} replacements to {source}", pairs.len());

    let settled = match (source.kind, source.playlist_id()) {
        (SourceKind::Playlist, Some(playlist_id)) => {
            apply_playlist(gateway, playlist_id, pairs).await?
        }
        _ => apply_library(gateway, records, pairs).await?,
    };

    let index: HashMap<usize, usize> = records
        .iter()
        .enumerate()
        .map(|(i, record)| (record.position, i))
        .collect();
    for (position, add, remove) in settled {
        if let Some(&i) = index.get(&position) {
            settle(&mut records[i], add, remove);
        }
    }
    Ok(())
}

/// Mark every pair as planned without touching the source.
pub fn mark_planned(records: &mut [AuditRecord], pairs: &[PlannedPair]) {
    let planned: HashSet<usize> = pairs.iter().map(|pair| pair.position).collect();
    for record in records.iter_mut().filter(|r| planned.contains(&r.position)) {
        record.mutation = Some(MutationOutcome::Planned);
    }
}

fn settle(record: &mut AuditRecord, add: Step, remove: Option<Step>) {
    let outcome = match (add, remove) {
        (Err(msg), _) | (Ok(_), Some(Err(msg))) => {
            record.fail(FailureKind::Mutation, reason::MUTATION_FAILED, msg);
            MutationOutcome::Failed
        }
        (Ok(WriteOutcome::Applied), _) | (_, Some(Ok(WriteOutcome::Applied))) => {
            MutationOutcome::Applied
        }
        _ => MutationOutcome::AlreadySatisfied,
    };
    tracing::debug!("{}: {outcome}", record.original.label());
    record.mutation = Some(outcome);
}

/// Per-item step results of a chunked write, failing on fatal errors.
fn steps_by_item<T, K>(
    chunks: Vec<ChunkResult<T>>,
    key: impl Fn(&T) -> K,
) -> Result<HashMap<K, Step>>
where
    K: std::hash::Hash + Eq,
{
    let mut steps = HashMap::new();
    for chunk in chunks {
        let step = match chunk.outcome {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!("Write of {} items failed: {err}", chunk.items.len());
                Err(err.to_string())
            }
        };
        for item in &chunk.items {
            steps.insert(key(item), step.clone());
        }
    }
    Ok(steps)
}

async fn apply_library(
    gateway: &Gateway,
    records: &[AuditRecord],
    pairs: &[PlannedPair],
) -> Result<Vec<(usize, Step, Option<Step>)>> {
    let present: HashSet<&str> = records
        .iter()
        .filter(|r| r.status == AuditStatus::Ok)
        .map(|r| r.original.id.as_str())
        .collect();
    let targets: HashSet<&str> = pairs.iter().map(|p| p.add.track_id.as_str()).collect();

    let mut to_save = Vec::new();
    let mut seen = HashSet::new();
    for pair in pairs {
        let id = pair.add.track_id.as_str();
        if !present.contains(id) && seen.insert(id) {
            to_save.push(id.to_string());
        }
    }
    let saved = steps_by_item(gateway.save_tracks(&to_save).await, Clone::clone)?;
    let add_step = |id: &str| -> Step {
        if present.contains(id) {
            return Ok(WriteOutcome::AlreadySatisfied);
        }
        saved
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(format!("{id} was not saved")))
    };

    // Never remove an id that another pair just saved
    let mut to_remove = Vec::new();
    let mut seen = HashSet::new();
    for pair in pairs {
        let id = pair.remove.track_id.as_str();
        if add_step(pair.add.track_id.as_str()).is_ok() && !targets.contains(id) && seen.insert(id) {
            to_remove.push(id.to_string());
        }
    }
    let removed = steps_by_item(gateway.unsave_tracks(&to_remove).await, Clone::clone)?;

    Ok(pairs
        .iter()
        .map(|pair| {
            let add = add_step(pair.add.track_id.as_str());
            let old = pair.remove.track_id.as_str();
            let remove = match &add {
                Err(_) => None,
                Ok(_) if targets.contains(old) => Some(Ok(WriteOutcome::AlreadySatisfied)),
                Ok(_) => Some(
                    removed
                        .get(old)
                        .cloned()
                        .unwrap_or_else(|| Err(format!("{old} was not removed"))),
                ),
            };
            (pair.position, add, remove)
        })
        .collect())
}

async fn apply_playlist(
    gateway: &Gateway,
    playlist_id: &str,
    pairs: &[PlannedPair],
) -> Result<Vec<(usize, Step, Option<Step>)>> {
    let mut settled = Vec::with_capacity(pairs.len());
    let mut offset: usize = 0;

    for chunk in pairs.chunks(limits::PLAYLIST_WRITE) {
        let mut inserted: Vec<(usize, Step)> = Vec::new();
        let mut removals: Vec<PositionedUri> = Vec::new();

        for pair in chunk {
            let at = pair.position + offset;
            match gateway.insert_playlist_item(playlist_id, &pair.add.uri, at).await {
                Ok(WriteOutcome::Applied) => {
                    offset += 1;
                    removals.push(PositionedUri {
                        uri: pair.remove.uri.clone(),
                        position: at + 1,
                    });
                    inserted.push((pair.position, Ok(WriteOutcome::Applied)));
                }
                // Nothing was inserted, so the original stays and indices are unchanged
                Ok(WriteOutcome::AlreadySatisfied) => {
                    tracing::warn!("Insert at {at} in {playlist_id} conflicted, keeping the original");
                    let step = Err(format!("insert of {} at {at} conflicted", pair.add.uri));
                    settled.push((pair.position, step, None));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!("Insert at {at} in {playlist_id} failed: {err}");
                    settled.push((pair.position, Err(err.to_string()), None));
                }
            }
        }

        if removals.is_empty() {
            continue;
        }
        let chunks = gateway.remove_playlist_items(playlist_id, &removals).await;
        let conflicted = chunks
            .iter()
            .any(|c| matches!(c.outcome, Ok(WriteOutcome::AlreadySatisfied)));
        let removed = steps_by_item(chunks, |item: &PositionedUri| item.position)?;

        // A conflicting removal may have removed nothing; check what is left
        let current = if conflicted {
            Some(playlist_uris(gateway, playlist_id).await?)
        } else {
            None
        };

        for ((position, add), removal) in inserted.into_iter().zip(&removals) {
            let mut remove = removed
                .get(&removal.position)
                .cloned()
                .unwrap_or_else(|| Err(format!("position {} was not removed", removal.position)));
            let still_present = matches!(remove, Ok(WriteOutcome::AlreadySatisfied))
                && current
                    .as_ref()
                    .is_some_and(|uris| uris.get(removal.position) == Some(&removal.uri));
            if still_present {
                remove = Err(format!(
                    "{} is still at position {} after a conflicting removal",
                    removal.uri, removal.position
                ));
            }
            // Only confirmed removals shift later indices back
            if remove.is_ok() {
                offset -= 1;
            }
            settled.push((position, add, Some(remove)));
        }
    }

    Ok(settled)
}

/// Every item uri of the playlist as it stands now.
async fn playlist_uris(gateway: &Gateway, playlist_id: &str) -> Result<Vec<String>> {
    let mut uris = Vec::new();
    let mut offset = Some(0);
    while let Some(current) = offset {
        let page = gateway.playlist_items_page(playlist_id, current).await?;
        offset = page.next_offset;
        uris.extend(page.items.into_iter().map(|track| track.uri));
    }
    Ok(uris)
}
