//! Status classification.
//!
//! Looks every catalog track up in the run's market, in lookup-sized batches
//! run a few at a time, and turns each answer into an [`AuditRecord`].
//! Items without catalog metadata never reach the lookup.

use futures::stream::{self, StreamExt};

use super::RunContext;
use crate::catalog::limits;
use crate::error::Result;
use crate::model::{AuditRecord, AuditStatus, FailureKind, RunConfig, Track, reason};

/// Classify one track from its lookup answer.
///
/// `resolved` is the market-scoped lookup result for `original.id`, `None`
/// when the catalog does not know the id.
pub fn classify(position: usize, original: Track, resolved: Option<Track>, run: &RunConfig) -> AuditRecord {
    let eligible = run.is_eligible(&original);

    let mut record = match resolved {
        _ if !original.has_catalog_metadata() => AuditRecord::new(
            position,
            original,
            AuditStatus::Unplayable,
            reason::UNAVAILABLE_METADATA,
        ),
        None => AuditRecord::new(position, original, AuditStatus::Unplayable, reason::NOT_FOUND),
        Some(canonical) => {
            let redirected = !canonical.id.is_empty() && canonical.id != original.id;
            if !canonical.is_playable {
                let why = if redirected {
                    reason::REDIRECT_UNPLAYABLE
                } else {
                    reason::UNPLAYABLE
                };
                AuditRecord::new(position, original, AuditStatus::Unplayable, why)
            } else if redirected {
                let mut target = canonical;
                target.linked_from = Some(original.id.clone());
                let mut record =
                    AuditRecord::new(position, original, AuditStatus::Relinked, reason::RELINKED);
                record.replacement = Some(target);
                record
            } else {
                AuditRecord::new(position, original, AuditStatus::Ok, reason::OK)
            }
        }
    };
    record.eligible = eligible;
    record
}

/// Classify every enumerated track, preserving input order.
///
/// A batch whose lookup fails after retries marks its tracks `Unknown` and
/// the run continues; only fatal errors are returned.
pub async fn classify_all(ctx: &RunContext, entries: Vec<(usize, Track)>) -> Result<Vec<AuditRecord>> {
    let (lookups, skipped): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|(_, track)| track.has_catalog_metadata());

    let mut records: Vec<AuditRecord> = skipped
        .into_iter()
        .map(|(position, track)| classify(position, track, None, &ctx.run))
        .collect();

    let batches: Vec<Vec<(usize, Track)>> = lookups
        .chunks(limits::LOOKUP)
        .map(<[_]>::to_vec)
        .collect();
    tracing::info!(
        "Classifying {} tracks in {} batches (market {})",
        lookups.len(),
        batches.len(),
        ctx.run.market
    );

    let mut answers = stream::iter(batches)
        .map(|batch| async move {
            let ids: Vec<String> = batch.iter().map(|(_, track)| track.id.clone()).collect();
            let answer = ctx.gateway.lookup_tracks(&ids, ctx.run.market).await;
            (batch, answer)
        })
        .buffered(ctx.gateway.concurrency());

    while let Some((batch, answer)) = answers.next().await {
        match answer {
            Ok(resolved) => records.extend(
                batch
                    .into_iter()
                    .zip(resolved)
                    .map(|((position, track), found)| classify(position, track, found, &ctx.run)),
            ),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!("Lookup of {} tracks failed: {err}", batch.len());
                records.extend(batch.into_iter().map(|(position, track)| {
                    let eligible = ctx.run.is_eligible(&track);
                    let mut record =
                        AuditRecord::new(position, track, AuditStatus::Unknown, reason::LOOKUP_FAILED);
                    record.eligible = eligible;
                    record.fail(FailureKind::Lookup, reason::LOOKUP_FAILED, &err);
                    record
                }));
            }
        }
    }

    records.sort_by_key(|record| record.position);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::ApiError;
    use crate::catalog::traits::mocks::MockCatalog;
    use crate::model::Source;
    use crate::test_utils::{catalog_track, run_config, run_context};

    fn library() -> RunConfig {
        run_config(Source::library("me"))
    }

    #[test]
    fn test_playable_canonical_is_ok() {
        let track = catalog_track("a", "Song", "Artist");
        let record = classify(0, track.clone(), Some(track), &library());
        assert_eq!(record.status, AuditStatus::Ok);
        assert!(record.replacement.is_none());
    }

    #[test]
    fn test_absent_is_unplayable() {
        let record = classify(0, catalog_track("a", "Song", "Artist"), None, &library());
        assert_eq!(record.status, AuditStatus::Unplayable);
        assert_eq!(record.reason, reason::NOT_FOUND);
    }

    #[test]
    fn test_not_playable_in_market() {
        let stored = catalog_track("a", "Song", "Artist");
        let resolved = Track {
            is_playable: false,
            ..stored.clone()
        };
        let record = classify(3, stored, Some(resolved), &library());
        assert_eq!(record.status, AuditStatus::Unplayable);
        assert_eq!(record.reason, reason::UNPLAYABLE);
        assert_eq!(record.position, 3);
    }

    #[test]
    fn test_redirect_is_relinked_with_target() {
        let stored = catalog_track("old", "Song", "Artist");
        let canonical = Track {
            album: "Remaster".into(),
            ..catalog_track("new", "Song", "Artist")
        };
        let record = classify(0, stored, Some(canonical), &library());
        assert_eq!(record.status, AuditStatus::Relinked);
        let target = record.replacement.as_ref().unwrap();
        assert_eq!(target.id, "new");
        assert_eq!(target.album, "Remaster");
        assert_eq!(target.linked_from.as_deref(), Some("old"));
        assert!(record.score.is_none());
    }

    #[test]
    fn test_unplayable_redirect_target() {
        let canonical = Track {
            is_playable: false,
            ..catalog_track("new", "Song", "Artist")
        };
        let record = classify(0, catalog_track("old", "Song", "Artist"), Some(canonical), &library());
        assert_eq!(record.status, AuditStatus::Unplayable);
        assert_eq!(record.reason, reason::REDIRECT_UNPLAYABLE);
        assert!(record.replacement.is_none());
    }

    #[test]
    fn test_missing_metadata() {
        let local = Track {
            is_local: true,
            ..catalog_track("", "demo", "Me")
        };
        let record = classify(0, local, None, &library());
        assert_eq!(record.status, AuditStatus::Unplayable);
        assert_eq!(record.reason, reason::UNAVAILABLE_METADATA);
    }

    #[test]
    fn test_artist_filter_marks_eligibility() {
        let mut run = library();
        run.artist_filter = Some("someone else".into());
        let track = catalog_track("a", "Song", "Artist");
        let record = classify(0, track.clone(), Some(track), &run);
        assert!(!record.eligible);
    }

    #[tokio::test]
    async fn test_classify_all_batches_and_keeps_order() {
        let mock = Arc::new(MockCatalog::new("me"));
        let mut entries = Vec::new();
        for i in 0..120 {
            let track = catalog_track(&format!("t{i}"), "Song", "Artist");
            mock.add_track(track.clone());
            entries.push((i, track));
        }
        entries.push((120, Track::default()));
        let ctx = run_context(mock.clone(), library());

        let records = classify_all(&ctx, entries).await.unwrap();
        assert_eq!(records.len(), 121);
        assert!(records.windows(2).all(|w| w[0].position < w[1].position));
        assert_eq!(records[120].reason, reason::UNAVAILABLE_METADATA);
        assert_eq!(mock.call_count("tracks"), 3);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_unknown() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next("tracks", vec![ApiError::Server { status: 500 }; 3]);
        let track = catalog_track("a", "Song", "Artist");
        mock.add_track(track.clone());
        let ctx = run_context(mock, library());

        let records = classify_all(&ctx, vec![(0, track)]).await.unwrap();
        assert_eq!(records[0].status, AuditStatus::Unknown);
        assert_eq!(records[0].failure, Some(FailureKind::Lookup));
        assert!(records[0].reason.starts_with(reason::LOOKUP_FAILED));
    }

    #[tokio::test]
    async fn test_lookup_auth_failure_is_fatal() {
        let mock = Arc::new(MockCatalog::new("me"));
        mock.fail_next("tracks", vec![ApiError::Unauthorized("expired".into())]);
        let ctx = run_context(mock, library());

        let result = classify_all(&ctx, vec![(0, catalog_track("a", "Song", "Artist"))]).await;
        assert!(result.unwrap_err().is_fatal());
    }
}
