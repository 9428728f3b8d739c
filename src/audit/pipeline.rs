//! Run orchestration.

use super::plan::{self, PlannedPair};
use super::{RunContext, classify, enumerate, execute, matcher};
use crate::error::Result;
use crate::model::{AuditRecord, RunSummary};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// One record per enumerated track, in source order
    pub records: Vec<AuditRecord>,
    /// Planned replacements, applied unless the run was dry
    pub plan: Vec<PlannedPair>,
    pub summary: RunSummary,
}

/// Enumerate, classify, match, plan and (unless dry) execute.
///
/// Per-track failures end up on the records; an `Err` means the run was
/// aborted by a fatal error.
pub async fn run(ctx: &RunContext) -> Result<RunOutcome> {
    let source = &ctx.run.source;
    tracing::info!(
        "Auditing {source} in market {} ({})",
        ctx.run.market,
        if ctx.run.dry_run { "dry run" } else { "live" }
    );

    let entries = enumerate::collect_all(&ctx.gateway, source).await?;
    let mut records = classify::classify_all(ctx, entries).await?;
    matcher::match_all(ctx, &mut records).await?;

    let plan = plan::plan(&ctx.run, &records);
    tracing::info!("Planned {} replacements", plan.len());

    if ctx.run.dry_run {
        execute::mark_planned(&mut records, &plan);
    } else {
        execute::apply(&ctx.gateway, source, &mut records, &plan).await?;
    }

    records.sort_by_key(|record| record.position);
    let summary = RunSummary::from_records(&records);
    tracing::info!(
        "Run finished: {} ok, {} unplayable, {} relinked, {} mutated, {} failed",
        summary.ok,
        summary.unplayable,
        summary.relinked,
        summary.mutated,
        summary.failed
    );

    Ok(RunOutcome {
        records,
        plan,
        summary,
    })
}
