//! Core data models for an audit run.
//!
//! Defines the entities every pipeline stage exchanges: [`Track`],
//! [`Source`], [`RunConfig`], [`AuditRecord`] and [`MutationOp`]. All of them
//! are built fresh from live API state for one run and never persisted.

use std::fmt;

use serde::Serialize;

use crate::market::Market;

/// Reason strings that appear in the report.
pub mod reason {
    pub const OK: &str = "OK";
    pub const RELINKED: &str = "relinked to canonical id";
    pub const UNPLAYABLE: &str = "not playable in market";
    pub const REPLACED: &str = "unplayable, replacement found";
    pub const UNAVAILABLE_METADATA: &str = "unavailable metadata";
    pub const NOT_FOUND: &str = "track not found in catalog";
    pub const NO_MATCH: &str = "no match found";
    pub const REDIRECT_UNPLAYABLE: &str = "unplayable (redirect target also unplayable)";
    pub const OUTSIDE_FILTER: &str = "outside artist filter";
    pub const LOOKUP_FAILED: &str = "lookup failed";
    pub const SEARCH_FAILED: &str = "search failed";
    pub const MUTATION_FAILED: &str = "mutation failed";
}

/// A track as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Track {
    /// Catalog id (empty for non-catalog items)
    pub id: String,
    /// Catalog URI (`spotify:track:<id>`, or a local-file URI)
    pub uri: String,
    /// Track title
    pub name: String,
    /// Artist names, primary artist first
    pub artists: Vec<String>,
    /// Album title
    pub album: String,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Playable in the market the track was looked up with
    pub is_playable: bool,
    /// Requested id when the catalog redirected the lookup
    pub linked_from: Option<String>,
    /// Local file or other item the catalog cannot resolve
    pub is_local: bool,
}

impl Track {
    /// First credited artist, if any.
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// Whether enough metadata exists to look the track up and search for it.
    pub fn has_catalog_metadata(&self) -> bool {
        !self.is_local
            && !self.id.trim().is_empty()
            && !self.name.trim().is_empty()
            && self.artists.iter().any(|a| !a.trim().is_empty())
    }

    /// Display form used in console output and logs.
    pub fn label(&self) -> String {
        match self.primary_artist() {
            Some(artist) => format!("'{}' by '{}'", self.name, artist),
            None if self.name.is_empty() => format!("<{}>", self.uri),
            None => format!("'{}'", self.name),
        }
    }
}

/// Kind of collection being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    /// The user's saved tracks (unordered, deduplicated by id)
    Library,
    /// An owned, ordered playlist
    Playlist,
}

/// The collection a run audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub kind: SourceKind,
    /// Playlist id; absent for the library
    pub id: Option<String>,
    /// Owning user id
    pub owner: String,
    /// Display name
    pub name: String,
}

impl Source {
    pub fn library(owner: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Library,
            id: None,
            owner: owner.into(),
            name: "Liked Songs".to_string(),
        }
    }

    pub fn playlist(
        id: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: SourceKind::Playlist,
            id: Some(id.into()),
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Playlist id when this is a playlist source.
    pub fn playlist_id(&self) -> Option<&str> {
        match self.kind {
            SourceKind::Playlist => self.id.as_deref(),
            SourceKind::Library => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::Library => f.write_str(&self.name),
            SourceKind::Playlist => write!(f, "Playlist '{}'", self.name),
        }
    }
}

/// Resolved parameters of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Skip the executor entirely
    pub dry_run: bool,
    pub market: Market,
    /// Case-insensitive artist name that narrows mutation eligibility
    pub artist_filter: Option<String>,
    pub source: Source,
}

impl RunConfig {
    /// Whether a track may be replaced or mutated under the artist filter.
    ///
    /// Every track is audited regardless; the filter only narrows which
    /// records are candidates for mutation.
    pub fn is_eligible(&self, track: &Track) -> bool {
        let Some(filter) = self.artist_filter.as_deref() else {
            return true;
        };
        let filter = filter.trim().to_lowercase();
        track
            .artists
            .iter()
            .any(|artist| artist.trim().to_lowercase() == filter)
    }
}

/// Classification outcome for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditStatus {
    /// Playable and canonical
    Ok,
    /// Not playable in the market, absent, or without usable metadata
    Unplayable,
    /// The catalog redirected the id to a newer canonical one
    Relinked,
    /// Lookup failed after retries; status undetermined
    Unknown,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Unplayable => "Unplayable",
            Self::Relinked => "Relinked",
            Self::Unknown => "Unknown",
        })
    }
}

/// Stage at which a record's processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Lookup,
    Search,
    Mutation,
}

/// What happened to a record's replacement pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutationOutcome {
    /// Planned but not applied (dry run)
    Planned,
    /// Add and remove both applied
    Applied,
    /// The collection was already in the target state
    AlreadySatisfied,
    /// At least one half of the pair failed
    Failed,
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planned => "planned (dry run)",
            Self::Applied => "applied",
            Self::AlreadySatisfied => "already satisfied",
            Self::Failed => "failed",
        })
    }
}

/// One audited track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Ordinal in the source's native order, unique per run
    pub position: usize,
    pub original: Track,
    pub status: AuditStatus,
    /// Relink target or selected search candidate
    pub replacement: Option<Track>,
    /// Match score for search candidates (relinks carry none)
    pub score: Option<f64>,
    pub reason: String,
    /// Passed the artist filter
    pub eligible: bool,
    pub failure: Option<FailureKind>,
    pub mutation: Option<MutationOutcome>,
}

impl AuditRecord {
    pub fn new(position: usize, original: Track, status: AuditStatus, reason: &str) -> Self {
        Self {
            position,
            original,
            status,
            replacement: None,
            score: None,
            reason: reason.to_string(),
            eligible: true,
            failure: None,
            mutation: None,
        }
    }

    /// Mark the record as failed at `kind`, recording the cause in the reason.
    pub fn fail(&mut self, kind: FailureKind, base: &str, detail: impl fmt::Display) {
        self.failure = Some(kind);
        self.reason = format!("{base}: {detail}");
    }

    /// Whether the record produces a Remove/Add pair when planned.
    pub fn wants_mutation(&self) -> bool {
        self.eligible
            && self.failure.is_none()
            && matches!(self.status, AuditStatus::Relinked | AuditStatus::Unplayable)
            && self
                .replacement
                .as_ref()
                .is_some_and(|r| !r.id.is_empty() && r.id != self.original.id)
    }
}

/// Direction of a modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MutationKind {
    Add,
    Remove,
}

/// One modification of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOp {
    pub kind: MutationKind,
    pub source: Source,
    pub track_id: String,
    /// Catalog URI; playlist writes address items by URI
    pub uri: String,
    /// Original position for playlist sources
    pub position: Option<usize>,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            MutationKind::Add => "Add",
            MutationKind::Remove => "Remove",
        };
        match self.position {
            Some(pos) => write!(f, "{verb}({}@{pos})", self.track_id),
            None => write!(f, "{verb}({})", self.track_id),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub ok: usize,
    pub unplayable: usize,
    pub relinked: usize,
    pub unknown: usize,
    pub replacements_found: usize,
    pub mutated: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.status {
                AuditStatus::Ok => summary.ok += 1,
                AuditStatus::Unplayable => summary.unplayable += 1,
                AuditStatus::Relinked => summary.relinked += 1,
                AuditStatus::Unknown => summary.unknown += 1,
            }
            if record.replacement.is_some() {
                summary.replacements_found += 1;
            }
            if record.mutation == Some(MutationOutcome::Applied) {
                summary.mutated += 1;
            }
            if record.failure.is_some() {
                summary.failed += 1;
            }
        }
        summary
    }
}
