//! # aqlhr-auth-client
//!
//! Resolves a caller's bearer token to a user by asking the auth service:
//! `GET {base_url}/auth/v1/user` with `Authorization: Bearer <token>` and the
//! project `apikey` header.
//!
//! A 401 or 403 means the token is not valid and yields `Ok(None)`. Any other
//! non-success status is an error, as are transport failures that survive
//! the retry policy.

pub mod config;
pub mod error;
pub(crate) mod retry;

pub use config::{AuthServiceConfig, ConfigError};
pub use error::AuthClientError;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const USER_ENDPOINT: &str = "auth/v1/user";

/// The user a token belongs to. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    user_url: String,
}

impl AuthClient {
    pub fn new(config: AuthServiceConfig) -> Result<Self, AuthClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let mut key = reqwest::header::HeaderValue::from_str(config.api_key.as_str())
                    .map_err(|_| AuthClientError::Config(ConfigError::MissingApiKey))?;
                key.set_sensitive(true);
                headers.insert("apikey", key);
                headers
            })
            .build()
            .map_err(|e| AuthClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let user_url = format!(
            "{}/{USER_ENDPOINT}",
            config.base_url.as_str().trim_end_matches('/')
        );
        Ok(Self { http, user_url })
    }

    /// Look up the user for `token`.
    ///
    /// `Ok(None)` means the service rejected the token.
    pub async fn verify_token(&self, token: &str) -> Result<Option<AuthUser>, AuthClientError> {
        let endpoint = USER_ENDPOINT.to_string();
        let resp = retry::Backoff::AUTH_SERVICE
            .send(|| self.http.get(&self.user_url).bearer_auth(token).send())
            .await
            .map_err(|e| AuthClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthClientError::ApiError {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|e| AuthClientError::Deserialization { endpoint, source: e })
    }
}
