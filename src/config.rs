//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\relink-auditor\config.toml
//! - macOS: ~/Library/Application Support/relink-auditor/config.toml
//! - Linux: ~/.config/relink-auditor/config.toml
//!
//! Every section is optional. The file holds API credentials and the tuning
//! constants of the matcher and gateway; command-line values win over it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::BackoffPolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials
    pub credentials: Credentials,

    /// Candidate scoring
    pub matching: MatchingConfig,

    /// Request batching, concurrency and retry
    pub gateway: GatewayConfig,

    /// Workbook output
    pub report: ReportConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Application client id
    pub client_id: Option<String>,
    /// Application client secret
    pub client_secret: Option<String>,
    /// Long-lived refresh token authorised for library and playlist scopes
    pub refresh_token: Option<String>,
    /// Pre-issued bearer token (used as-is, never refreshed)
    pub access_token: Option<String>,
}

/// Candidate matcher tuning.
///
/// The weights need not sum to one; scores are divided by the weight total
/// so they stay within `0.0..=1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Weight of normalized title similarity
    pub name_weight: f64,
    /// Weight of artist-set overlap
    pub artist_weight: f64,
    /// Weight of duration closeness
    pub duration_weight: f64,
    /// Minimum score a candidate needs to be accepted
    pub acceptance_threshold: f64,
    /// Number of search results scored per query
    pub top_n: usize,
    /// Duration difference that carries no penalty
    pub duration_tolerance_ms: u64,
    /// Beyond the tolerance, closeness falls linearly to zero over this span
    pub duration_falloff_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_weight: 0.5,
            artist_weight: 0.3,
            duration_weight: 0.2,
            acceptance_threshold: 0.8,
            top_n: 10,
            duration_tolerance_ms: 3_000,
            duration_falloff_ms: 30_000,
        }
    }
}

/// Gateway tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Concurrent classification/search batches
    pub concurrency: usize,
    /// Per-call network timeout in seconds
    pub request_timeout_secs: u64,
    /// Attempts for a rate-limited call, including the first
    pub rate_limit_attempts: u32,
    /// First rate-limit backoff when the server gives no delay
    pub rate_limit_base_ms: u64,
    /// Rate-limit backoff ceiling
    pub rate_limit_cap_ms: u64,
    /// Attempts for a call failing with 5xx or network errors
    pub transient_attempts: u32,
    /// First transient backoff
    pub transient_base_ms: u64,
    /// Transient backoff ceiling
    pub transient_cap_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout_secs: 20,
            rate_limit_attempts: 5,
            rate_limit_base_ms: 1_000,
            rate_limit_cap_ms: 60_000,
            transient_attempts: 4,
            transient_base_ms: 500,
            transient_cap_ms: 8_000,
        }
    }
}

impl GatewayConfig {
    /// Backoff applied to rate-limit signals.
    pub fn rate_limit_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.rate_limit_attempts.max(1),
            base_delay: Duration::from_millis(self.rate_limit_base_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(self.rate_limit_cap_ms),
            jitter: false,
        }
    }

    /// Backoff applied to 5xx and network failures.
    pub fn transient_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.transient_attempts.max(1),
            base_delay: Duration::from_millis(self.transient_base_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(self.transient_cap_ms),
            jitter: true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(10, 30))
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// File name prefix; the file is `<prefix>_<yyyymmdd-HHMM>.xlsx`
    pub prefix: String,
    /// Directory the workbook is written to
    pub directory: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prefix: "relink_audit".to_string(),
            directory: PathBuf::from("."),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("relink-auditor"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path.
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
