//! # Bearer Token Authentication
//!
//! Every engine endpoint requires `Authorization: Bearer <token>`. A token is
//! accepted when either:
//!
//! - it equals the static service token (`AUTH_TOKEN`), compared in
//!   constant time, or
//! - the auth service resolves it to a user (`GET /auth/v1/user`).
//!
//! With neither configured, auth is disabled and every request runs as a
//! development caller.
//!
//! Rejections use the flat error model: HTTP 400, `code: "UNAUTHORIZED"`.

use aqlhr_auth_client::AuthClient;
use axum::extract::Request;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::AppError;

// -- CallerIdentity -----------------------------------------------------------

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerKind {
    /// A user resolved by the auth service.
    User,
    /// The static service token.
    Service,
    /// Auth disabled.
    Development,
}

/// Identity of the authenticated caller, injected by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub kind: CallerKind,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl CallerIdentity {
    fn service() -> Self {
        Self {
            kind: CallerKind::Service,
            user_id: None,
            email: None,
        }
    }

    pub(crate) fn development() -> Self {
        Self {
            kind: CallerKind::Development,
            user_id: None,
            email: None,
        }
    }

    /// Actor recorded on audit rows.
    pub fn actor_id(&self) -> Option<String> {
        match self.kind {
            CallerKind::User => self.user_id.clone(),
            CallerKind::Service => Some("service".to_string()),
            CallerKind::Development => None,
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// -- Auth Configuration -------------------------------------------------------

/// Auth configuration injected into request extensions.
///
/// `Debug` redacts the token.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Zeroizing<String>>,
    pub client: Option<AuthClient>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.token.is_some() || self.client.is_some()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("client", &self.client.is_some())
            .finish()
    }
}

// -- Token Validation ---------------------------------------------------------

/// Constant-time comparison of bearer tokens.
///
/// On a length mismatch a dummy comparison still runs.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Resolve a presented token to a caller.
async fn authenticate(config: &AuthConfig, provided: &str) -> Result<CallerIdentity, String> {
    if let Some(expected) = &config.token {
        if constant_time_token_eq(provided, expected.as_str()) {
            return Ok(CallerIdentity::service());
        }
    }

    let client = match &config.client {
        Some(client) => client,
        None => return Err("invalid bearer token".into()),
    };

    match client.verify_token(provided).await {
        Ok(Some(user)) => Ok(CallerIdentity {
            kind: CallerKind::User,
            user_id: Some(user.id.to_string()),
            email: user.email,
        }),
        Ok(None) => Err("invalid bearer token".into()),
        Err(e) => {
            tracing::warn!(error = %e, "auth service lookup failed");
            Err("unable to verify bearer token".into())
        }
    }
}

// -- Middleware ---------------------------------------------------------------

/// Validate the bearer token and inject a [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if !config.is_enabled() {
        request
            .extensions_mut()
            .insert(CallerIdentity::development());
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match auth_header {
        Some(header_value) => match header_value.strip_prefix("Bearer ") {
            Some(provided) if !provided.trim().is_empty() => {
                match authenticate(&config, provided.trim()).await {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed");
                        unauthorized_response(&msg)
                    }
                }
            }
            Some(_) => {
                tracing::warn!("authentication failed: empty bearer token");
                unauthorized_response("missing bearer token")
            }
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}
