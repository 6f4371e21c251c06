//! Auth service client configuration.

use url::Url;
use zeroize::Zeroizing;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the auth service.
///
/// `Debug` redacts `api_key`.
#[derive(Clone)]
pub struct AuthServiceConfig {
    /// Base URL; `/auth/v1/user` is resolved against it.
    pub base_url: Url,
    /// Project API key, sent as the `apikey` header.
    pub api_key: Zeroizing<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AuthServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AuthServiceConfig {
    /// Load from the environment.
    ///
    /// - `AUTH_SERVICE_URL` (required)
    /// - `AUTH_SERVICE_API_KEY` (required)
    /// - `AUTH_SERVICE_TIMEOUT_SECS` (default: 10)
    ///
    /// Returns [`ConfigError::MissingUrl`] when the service is simply not
    /// configured, so callers can tell "off" apart from "misconfigured".
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("AUTH_SERVICE_URL").map_err(|_| ConfigError::MissingUrl)?;
        let base_url = parse_url("AUTH_SERVICE_URL", &raw_url)?;
        let api_key = std::env::var("AUTH_SERVICE_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;

        Ok(Self {
            base_url,
            api_key: Zeroizing::new(api_key),
            timeout_secs: timeout_from(std::env::var("AUTH_SERVICE_TIMEOUT_SECS").ok()),
        })
    }

    /// Configuration pointing at a local mock server.
    pub fn local_mock(base_url: &str, api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_url("local_mock", base_url)?,
            api_key: Zeroizing::new(api_key.to_string()),
            timeout_secs: 5,
        })
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn timeout_from(raw: Option<String>) -> u64 {
    raw.and_then(|s| s.parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_SERVICE_URL is not set")]
    MissingUrl,
    #[error("AUTH_SERVICE_API_KEY is required when AUTH_SERVICE_URL is set")]
    MissingApiKey,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
