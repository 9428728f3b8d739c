//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror` (the catalog
//! layer speaks [`ApiError`]), while `main` works with [`Error`] and maps it
//! to a process exit code.
//!
//! # Design
//!
//! - [`Error`]: fatal or call-level failures of a run
//! - [`ApiError`]: raw outcome of one remote call, before retry policy
//! - Per-track failures are never returned as `Err` from the pipeline; they
//!   are recorded as reasons on audit records.
//!
//! # Example
//!
//! ```ignore
//! use relink_auditor::error::{Error, Result};
//!
//! fn settings(market: &str) -> Result<Market> {
//!     Market::parse(market) // invalid codes become Error::Config
//! }
//! ```

use std::path::PathBuf;

pub use crate::catalog::ApiError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration (flags, market code, source)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bearer token unavailable or rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limit still in force after every allowed retry
    #[error("Rate limited: retries exhausted after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Network or server failure that outlived the retry budget
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Requested entity does not exist (or is not visible to the user)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation target already in the requested state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request refused for a reason other than auth, absence or conflict
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Response did not match the expected shape
    #[error("Invalid response: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report could not be produced
    #[error("Report error for {path}: {message}")]
    Report { path: PathBuf, message: String },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a report error.
    pub fn report(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Report {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any context layers peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Fatal errors abort the run; everything else degrades to a per-track
    /// failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self.root(), Self::Config(_) | Self::Auth(_))
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            Self::Config(_) => 2,
            Self::Auth(_) => 3,
            _ => 1,
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(msg) => Self::Auth(msg),
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::Conflict(msg) => Self::Conflict(msg),
            ApiError::Parse(msg) => Self::Parse(msg),
            ApiError::RateLimited { .. } => Self::RateLimited { attempts: 1 },
            other @ ApiError::Client { .. } => Self::Rejected(other.to_string()),
            other @ (ApiError::Server { .. } | ApiError::Network(_)) => {
                Self::Transient(other.to_string())
            }
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("'ZZ' is not a valid market code");
        assert!(err.to_string().contains("ZZ"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::Transient("HTTP 503".into()).context("while reading playlist");
        let msg = err.to_string();
        assert!(msg.contains("while reading playlist"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_exit_codes_follow_root_cause() {
        assert_eq!(Error::config("bad").exit_code(), 2);
        assert_eq!(Error::auth("expired").context("lookup").exit_code(), 3);
        assert_eq!(Error::Transient("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::auth("nope").is_fatal());
        assert!(Error::config("nope").context("startup").is_fatal());
        assert!(!Error::Conflict("already removed".into()).is_fatal());
        assert!(!Error::RateLimited { attempts: 5 }.is_fatal());
    }

    #[test]
    fn test_api_error_conversion() {
        let err: Error = ApiError::Unauthorized("token expired".into()).into();
        assert!(matches!(err, Error::Auth(_)));

        let err: Error = ApiError::Server { status: 502 }.into();
        assert!(matches!(err, Error::Transient(_)));

        let err: Error = ApiError::Client {
            status: 400,
            message: "bad position".into(),
        }
        .into();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::NotFound("playlist".into()));
        let with_ctx = result.with_context("resolving source");
        assert!(with_ctx.unwrap_err().to_string().contains("resolving source"));
    }
}
