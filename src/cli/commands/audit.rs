//! The audit command.

use std::sync::Arc;

use chrono::Local;
use tokio::runtime::Runtime;

use super::Cli;
use crate::audit::{self, RunContext, RunOutcome};
use crate::catalog::{Gateway, RefreshingToken, SpotifyClient, StaticToken, TokenProvider};
use crate::config::{self, Credentials};
use crate::error::{Error, Result};
use crate::model::RunConfig;
use crate::report::{ReportSink, RunReport, XlsxReport};
use crate::select::{self, Console};

/// Audit the requested source, fix it unless dry, and write the report.
pub fn cmd_audit(rt: &Runtime, cli: &Cli) -> Result<()> {
    let request = cli.run_request();
    request.validate()?;

    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    let credentials = merge_credentials(cli, &config.credentials);
    let tokens = token_provider(&credentials)?;
    let client = SpotifyClient::new(tokens, config.gateway.request_timeout())?;
    let gateway = Gateway::new(Arc::new(client), &config.gateway);

    rt.block_on(async {
        let started = Local::now();
        let mut console = Console::stdio();
        let Some((user, run)) = select::prepare_run(&gateway, &request, &mut console).await? else {
            println!("Cancelled; nothing was changed.");
            return Ok(());
        };

        let ctx = RunContext::new(gateway, run, config.matching.clone());
        let outcome = audit::run(&ctx).await?;
        print_summary(&ctx.run, &outcome);

        let directory = cli
            .output_dir
            .clone()
            .unwrap_or_else(|| config.report.directory.clone());
        let sink = XlsxReport::new(directory, config.report.prefix.clone());
        let report = RunReport {
            started,
            user: &user,
            run: &ctx.run,
            records: &outcome.records,
            summary: &outcome.summary,
        };
        if let Some(path) = sink.write(&report)? {
            println!("Report: {}", path.display());
        }
        Ok::<_, Error>(())
    })
}

/// Flags and environment win over the config file, field by field.
fn merge_credentials(cli: &Cli, file: &Credentials) -> Credentials {
    let pick = |flag: &Option<String>, fallback: &Option<String>| {
        flag.clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| fallback.clone())
    };
    Credentials {
        client_id: pick(&cli.client_id, &file.client_id),
        client_secret: pick(&cli.client_secret, &file.client_secret),
        refresh_token: pick(&cli.refresh_token, &file.refresh_token),
        access_token: pick(&cli.access_token, &file.access_token),
    }
}

/// A refreshing provider when a full client/refresh triple is present,
/// otherwise a static bearer token.
fn token_provider(credentials: &Credentials) -> Result<Arc<dyn TokenProvider>> {
    if let (Some(id), Some(secret), Some(refresh)) = (
        &credentials.client_id,
        &credentials.client_secret,
        &credentials.refresh_token,
    ) {
        tracing::debug!("Using refresh-token credentials");
        return Ok(Arc::new(RefreshingToken::new(id, secret, refresh)?));
    }
    if let Some(token) = &credentials.access_token {
        tracing::debug!("Using a pre-issued access token");
        return Ok(Arc::new(StaticToken::new(token)));
    }
    Err(Error::auth(
        "no credentials: set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN, \
         or SPOTIFY_ACCESS_TOKEN",
    ))
}

fn print_summary(run: &RunConfig, outcome: &RunOutcome) {
    let s = &outcome.summary;
    println!();
    println!("=== {} ({}) ===", run.source, run.market);
    println!("Total:        {}", s.total);
    println!("OK:           {}", s.ok);
    println!("Unplayable:   {}", s.unplayable);
    println!("Relinked:     {}", s.relinked);
    if s.unknown > 0 {
        println!("Unknown:      {}", s.unknown);
    }
    println!("Replacements: {}", s.replacements_found);

    if run.dry_run {
        println!("\n[DRY RUN - {} replacements planned, nothing changed]", outcome.plan.len());
        if !outcome.plan.is_empty() {
            println!("Re-run with --dry-run false to apply them.");
        }
    } else {
        println!("Mutated:      {}", s.mutated);
        println!("Failed:       {}", s.failed);
    }
}
