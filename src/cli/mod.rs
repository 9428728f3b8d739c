//! Command-line interface for relink-auditor.
//!
//! Parses the flags, wires credentials and configuration into a catalog
//! gateway, and drives one audit run from selection to report.

mod commands;

pub use commands::{Cli, exit_code, run_command};
