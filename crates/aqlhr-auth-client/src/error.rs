//! Auth service client error types.

/// Errors from auth service calls.
#[derive(Debug, thiserror::Error)]
pub enum AuthClientError {
    /// HTTP transport error, after retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The auth service answered with an unexpected status.
    #[error("auth service {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
