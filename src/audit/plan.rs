//! Mutation planning.
//!
//! Every record with an accepted replacement (a relink target or a selected
//! search candidate) yields exactly one Add(new)/Remove(old) pair. The Add
//! always comes first so a partial failure never loses a track.

use crate::model::{AuditRecord, MutationKind, MutationOp, RunConfig, SourceKind};

/// One replacement: add the new track, then remove the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPair {
    /// Position of the replaced record in the source
    pub position: usize,
    pub add: MutationOp,
    pub remove: MutationOp,
}

/// Pairs for every record that wants a mutation, in ascending position.
pub fn plan(run: &RunConfig, records: &[AuditRecord]) -> Vec<PlannedPair> {
    let ordered = run.source.kind == SourceKind::Playlist;

    let mut pairs: Vec<PlannedPair> = records
        .iter()
        .filter(|record| record.wants_mutation())
        .filter_map(|record| {
            let replacement = record.replacement.as_ref()?;
            let position = ordered.then_some(record.position);
            Some(PlannedPair {
                position: record.position,
                add: MutationOp {
                    kind: MutationKind::Add,
                    source: run.source.clone(),
                    track_id: replacement.id.clone(),
                    uri: replacement.uri.clone(),
                    position,
                },
                remove: MutationOp {
                    kind: MutationKind::Remove,
                    source: run.source.clone(),
                    track_id: record.original.id.clone(),
                    uri: record.original.uri.clone(),
                    position,
                },
            })
        })
        .collect();
    pairs.sort_by_key(|pair| pair.position);
    pairs
}

/// Flatten pairs into the operation list, Add before Remove.
pub fn operations(pairs: &[PlannedPair]) -> Vec<MutationOp> {
    pairs
        .iter()
        .flat_map(|pair| [pair.add.clone(), pair.remove.clone()])
        .collect()
}
