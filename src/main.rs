//! relink-auditor - audit a streaming library or owned playlist for tracks
//! that no longer play, and replace them with playable equivalents.
//!
//! The run enumerates the chosen source, classifies every track against
//! the target market, searches for substitutes where needed, and (unless
//! it is a dry run) swaps them in place. Every run ends with a workbook
//! report.

pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod market;
pub mod model;
pub mod report;
pub mod select;
#[cfg(test)]
pub mod test_utils;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    // Logs go to stderr so prompts and the summary stay readable on stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relink_auditor=info")))
        .init();

    match cli::run_command(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = cli::exit_code(&err);
            eprintln!("Error: {err:#}");
            if code == 3 {
                eprintln!("Check the SPOTIFY_* credentials and that the token grants library and playlist scopes.");
            }
            ExitCode::from(code)
        }
    }
}
