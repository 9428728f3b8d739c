//! CLI definition and dispatch.
//!
//! There is a single command, the audit itself, implemented in `audit`.

mod audit;

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::error::Error;
use crate::select::{RunRequest, SourceRequest};

use audit::cmd_audit;

/// Find unplayable and relinked tracks in your library or an owned playlist
/// and replace them with playable equivalents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Report only (true) or apply replacements (false)
    #[arg(long, required = true, action = ArgAction::Set, value_parser = parse_bool, value_name = "BOOL")]
    pub dry_run: bool,

    /// Two-letter market code playability is judged in, e.g. BE
    #[arg(long, value_name = "CODE")]
    pub market: String,

    /// Choose the library or one of your playlists from a menu (wins over --playlist-id)
    #[arg(long)]
    pub select_from_list: bool,

    /// Audit this playlist instead of Liked Songs (must be owned by you)
    #[arg(long, value_name = "ID")]
    pub playlist_id: Option<String>,

    /// Only replace tracks crediting this artist (any credited artist, case-insensitive)
    #[arg(long, value_name = "NAME")]
    pub artist: Option<String>,

    /// Do not ask for confirmation before a live run
    #[arg(short, long)]
    pub yes: bool,

    /// Config file (default: the OS config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory the report is written to (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Refresh token with library and playlist scopes
    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Pre-issued access token, used as-is
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

impl Cli {
    pub fn run_request(&self) -> RunRequest {
        let source = if self.select_from_list {
            SourceRequest::Menu
        } else if let Some(id) = &self.playlist_id {
            SourceRequest::Playlist(id.clone())
        } else {
            SourceRequest::Library
        };

        RunRequest {
            dry_run: self.dry_run,
            market: self.market.clone(),
            artist: self.artist.clone(),
            source,
            assume_yes: self.yes,
        }
    }
}

/// Lenient boolean: true/t/1/yes/y and false/f/0/no/n, any case.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}

/// Process exit code for an error that ended the run.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

/// Run the audit described by the parsed flags.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    cmd_audit(&rt, cli)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        for value in ["true", "T", "1", "Yes", "y"] {
            assert_eq!(parse_bool(value), Ok(true), "{value}");
        }
        for value in ["false", "F", "0", "NO", "n"] {
            assert_eq!(parse_bool(value), Ok(false), "{value}");
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_dry_run_and_market_are_required() {
        assert!(Cli::try_parse_from(["relink-auditor", "--market", "BE"]).is_err());
        assert!(Cli::try_parse_from(["relink-auditor", "--dry-run", "true"]).is_err());
    }

    #[test]
    fn test_source_request_from_flags() {
        let cli = Cli::try_parse_from(["relink-auditor", "--dry-run", "yes", "--market", "be"]).unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.run_request().source, SourceRequest::Library);

        let cli = Cli::try_parse_from([
            "relink-auditor",
            "--dry-run",
            "f",
            "--market",
            "BE",
            "--playlist-id",
            "abc",
        ])
        .unwrap();
        assert!(!cli.dry_run);
        assert_eq!(cli.run_request().source, SourceRequest::Playlist("abc".into()));

        let cli = Cli::try_parse_from([
            "relink-auditor",
            "--dry-run",
            "1",
            "--market",
            "BE",
            "--select-from-list",
        ])
        .unwrap();
        assert_eq!(cli.run_request().source, SourceRequest::Menu);
    }

    #[test]
    fn test_menu_overrides_playlist_id() {
        let cli = Cli::try_parse_from([
            "relink-auditor",
            "--dry-run",
            "true",
            "--market",
            "BE",
            "--select-from-list",
            "--playlist-id",
            "abc",
        ])
        .unwrap();
        assert_eq!(cli.run_request().source, SourceRequest::Menu);
    }

    #[test]
    fn test_artist_help_describes_any_credited_artist() {
        use clap::CommandFactory;

        let command = Cli::command();
        let artist = command
            .get_arguments()
            .find(|arg| arg.get_id() == "artist")
            .unwrap();
        let help = artist.get_help().unwrap().to_string();
        assert!(help.contains("any credited artist"));
        assert!(!help.contains("primary"));
    }

    #[test]
    fn test_exit_code_follows_error_kind() {
        assert_eq!(exit_code(&Error::config("bad market").into()), 2);
        assert_eq!(exit_code(&Error::auth("revoked").into()), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("runtime")), 1);
    }
}
