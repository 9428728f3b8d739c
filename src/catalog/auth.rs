//! Bearer token providers.
//!
//! Token acquisition is outside the audit engine; the HTTP client only asks
//! a [`TokenProvider`] for a current bearer token before each call. A
//! provider whose grant is refused returns [`ApiError::Unauthorized`],
//! which the gateway treats as fatal; an unreachable or failing token
//! endpoint is transient and retried like any other call.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{ApiError, dto};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A bearer token valid for at least the next request.
    async fn bearer(&self) -> Result<String, ApiError>;
}

/// A pre-issued token used verbatim.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer(&self) -> Result<String, ApiError> {
        if self.0.trim().is_empty() {
            return Err(ApiError::Unauthorized("empty access token".into()));
        }
        Ok(self.0.clone())
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Exchanges a long-lived refresh token for short-lived access tokens,
/// caching each one until shortly before it expires.
pub struct RefreshingToken {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: tokio::sync::Mutex<String>,
    cached: tokio::sync::Mutex<Option<CachedToken>>,
}

impl RefreshingToken {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            token_url: TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: tokio::sync::Mutex::new(refresh_token.into()),
            cached: tokio::sync::Mutex::new(None),
        })
    }

    /// Point at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn refresh(&self) -> Result<CachedToken, ApiError> {
        let refresh_token = self.refresh_token.lock().await.clone();
        tracing::debug!("Refreshing access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Network(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(refresh_error(status.as_u16(), &body));
        }

        let token: dto::TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Unauthorized(format!("malformed token response: {e}")))?;

        // Rotated refresh tokens replace the old one for the rest of the run
        if let Some(rotated) = token.refresh_token {
            *self.refresh_token.lock().await = rotated;
        }

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

/// Classify a failed refresh: only a refused grant is an auth failure.
fn refresh_error(status: u16, body: &str) -> ApiError {
    match status {
        429 => ApiError::RateLimited { retry_after: None },
        500..=599 => ApiError::Server { status },
        _ => ApiError::Unauthorized(format!(
            "token refresh failed with HTTP {status}: {}",
            body.chars().take(200).collect::<String>()
        )),
    }
}

#[async_trait]
impl TokenProvider for RefreshingToken {
    async fn bearer(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.expires_at
        {
            return Ok(token.access_token.clone());
        }
        let fresh = self.refresh().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.bearer().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_unauthorized() {
        let provider = StaticToken::new("  ");
        assert!(matches!(
            provider.bearer().await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let provider = RefreshingToken::new("id", "secret", "refresh").unwrap();
        *provider.cached.lock().await = Some(CachedToken {
            access_token: "cached".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        });
        assert_eq!(provider.bearer().await.unwrap(), "cached");
    }

    #[test]
    fn test_refresh_error_classification() {
        assert!(refresh_error(503, "").is_transient());
        assert!(matches!(
            refresh_error(429, ""),
            ApiError::RateLimited { .. }
        ));
        assert!(matches!(
            refresh_error(400, r#"{"error":"invalid_grant"}"#),
            ApiError::Unauthorized(msg) if msg.contains("invalid_grant")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_transient() {
        // Nothing listens on the discard port
        let provider = RefreshingToken::new("id", "secret", "refresh")
            .unwrap()
            .with_token_url("http://127.0.0.1:9/api/token");
        let err = provider.bearer().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(err.is_transient());
    }
}
