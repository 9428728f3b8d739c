//! Candidate matching for unplayable tracks.
//!
//! For each unplayable track without a redirect, searches the catalog with
//! progressively looser queries and scores the playable results against the
//! original:
//!
//! ```text
//! score = (w_name * name + w_artist * artist + w_duration * duration) / (w_name + w_artist + w_duration)
//! ```
//!
//! - `name`: normalized Levenshtein similarity of the folded titles
//! - `artist`: fraction of the original's artists credited on the candidate
//! - `duration`: 1.0 within the tolerance, then linear decay to 0.0 over
//!   the falloff window
//!
//! The best candidate at or above the acceptance threshold wins; equal
//! scores go to the smallest id so repeated runs pick the same replacement.

use std::cmp::Ordering;

use futures::stream::{self, StreamExt};
use strsim::normalized_levenshtein;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::RunContext;
use crate::catalog::Gateway;
use crate::config::MatchingConfig;
use crate::error::Result;
use crate::market::Market;
use crate::model::{AuditRecord, AuditStatus, FailureKind, Track, reason};

/// Fold text for comparison: decompose, drop diacritics, lower-case, turn
/// punctuation into spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title similarity in `0.0..=1.0`.
pub fn name_similarity(original: &str, candidate: &str) -> f64 {
    normalized_levenshtein(&normalize(original), &normalize(candidate))
}

/// Fraction of the original's artists credited on the candidate, ignoring
/// order and letter case.
pub fn artist_overlap(original: &[String], candidate: &[String]) -> f64 {
    let wanted: Vec<String> = original
        .iter()
        .map(|a| normalize(a))
        .filter(|a| !a.is_empty())
        .collect();
    if wanted.is_empty() {
        return 0.0;
    }
    let credited: Vec<String> = candidate.iter().map(|a| normalize(a)).collect();
    let present = wanted.iter().filter(|a| credited.contains(a)).count();
    present as f64 / wanted.len() as f64
}

/// Duration closeness in `0.0..=1.0`.
pub fn duration_closeness(original_ms: u64, candidate_ms: u64, config: &MatchingConfig) -> f64 {
    let diff = original_ms.abs_diff(candidate_ms);
    if diff <= config.duration_tolerance_ms {
        return 1.0;
    }
    if config.duration_falloff_ms == 0 {
        return 0.0;
    }
    let over = (diff - config.duration_tolerance_ms) as f64;
    (1.0 - over / config.duration_falloff_ms as f64).max(0.0)
}

/// Weighted match score in `0.0..=1.0`.
pub fn score(original: &Track, candidate: &Track, config: &MatchingConfig) -> f64 {
    let total = config.name_weight + config.artist_weight + config.duration_weight;
    if total <= 0.0 {
        return 0.0;
    }
    let weighted = config.name_weight * name_similarity(&original.name, &candidate.name)
        + config.artist_weight * artist_overlap(&original.artists, &candidate.artists)
        + config.duration_weight
            * duration_closeness(original.duration_ms, candidate.duration_ms, config);
    (weighted / total).clamp(0.0, 1.0)
}

/// Search queries from most to least specific, without duplicates.
pub fn search_queries(track: &Track) -> Vec<String> {
    let clean = |s: &str| s.replace('"', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    let name = clean(&track.name);
    let artist = track.primary_artist().map(clean).unwrap_or_default();
    let album = clean(&track.album);

    let mut queries = Vec::with_capacity(3);
    if !artist.is_empty() && !album.is_empty() {
        queries.push(format!("{name} artist:{artist} album:{album}"));
    }
    if !artist.is_empty() {
        queries.push(format!("{name} artist:{artist}"));
    }
    queries.push(name);
    queries
}

/// Best acceptable candidate among `candidates` and its score.
pub fn select_candidate(
    original: &Track,
    candidates: &[Track],
    config: &MatchingConfig,
) -> Option<(Track, f64)> {
    candidates
        .iter()
        .filter(|c| c.is_playable && c.id != original.id && c.has_catalog_metadata())
        .take(config.top_n.max(1))
        .map(|c| (c, score(original, c, config)))
        .filter(|(_, s)| *s >= config.acceptance_threshold)
        .min_by(|(a, sa), (b, sb)| match sb.total_cmp(sa) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        })
        .map(|(c, s)| (c.clone(), s))
}

/// Search for a replacement, stopping at the first query that returns any
/// playable result.
pub async fn find_replacement(
    gateway: &Gateway,
    market: Market,
    config: &MatchingConfig,
    original: &Track,
) -> Result<Option<(Track, f64)>> {
    for query in search_queries(original) {
        let results = gateway.search_tracks(&query, market, config.top_n).await?;
        if !results.iter().any(|t| t.is_playable && t.id != original.id) {
            tracing::debug!("No playable results for {query:?}");
            continue;
        }
        let selected = select_candidate(original, &results, config);
        match &selected {
            Some((candidate, score)) => tracing::debug!(
                "{} -> {} ({score:.2}) via {query:?}",
                original.label(),
                candidate.label()
            ),
            None => tracing::debug!("No candidate for {} met the threshold", original.label()),
        }
        return Ok(selected);
    }
    Ok(None)
}

/// Whether a record should be searched for a replacement.
pub fn needs_search(record: &AuditRecord) -> bool {
    record.status == AuditStatus::Unplayable
        && record.failure.is_none()
        && record.replacement.is_none()
        && (record.reason == reason::UNPLAYABLE || record.reason == reason::NOT_FOUND)
}

/// Search replacements for every unplayable record that has none.
///
/// Searches run a few at a time. A search that fails after retries marks the
/// record failed and the run continues; only fatal errors are returned.
pub async fn match_all(ctx: &RunContext, records: &mut [AuditRecord]) -> Result<()> {
    let mut jobs = Vec::new();
    for (index, record) in records.iter_mut().enumerate() {
        if !needs_search(record) {
            continue;
        }
        if record.eligible {
            jobs.push((index, record.original.clone()));
        } else {
            record.reason = reason::OUTSIDE_FILTER.to_string();
        }
    }
    if jobs.is_empty() {
        return Ok(());
    }
    tracing::info!("Searching replacements for {} unplayable tracks", jobs.len());

    let outcomes: Vec<_> = stream::iter(jobs)
        .map(|(index, original)| async move {
            let found =
                find_replacement(&ctx.gateway, ctx.run.market, &ctx.matching, &original).await;
            (index, found)
        })
        .buffered(ctx.gateway.concurrency())
        .collect()
        .await;

    for (index, found) in outcomes {
        let record = &mut records[index];
        match found {
            Ok(Some((replacement, score))) => {
                record.replacement = Some(replacement);
                record.score = Some(score);
                record.reason = reason::REPLACED.to_string();
            }
            Ok(None) => record.reason = reason::NO_MATCH.to_string(),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!("Search for {} failed: {err}", record.original.label());
                record.fail(FailureKind::Search, reason::SEARCH_FAILED, err);
            }
        }
    }
    Ok(())
}
