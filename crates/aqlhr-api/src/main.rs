//! # aqlhr-api: Binary Entry Point
//!
//! Reads configuration from the environment, connects the optional
//! database and auth service, and serves the engines.

use aqlhr_api::state::{AppConfig, AppState};
use aqlhr_auth_client::{AuthClient, AuthServiceConfig, ConfigError};
use aqlhr_gosi::ProgressionPolicy;
use zeroize::Zeroizing;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("AQLHR_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn env_u32(var: &str) -> Result<Option<u32>, String> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| format!("{var} must be a positive integer, got {raw:?}")),
        Err(_) => Ok(None),
    }
}

/// `GOSI_PROGRESSION_MONTH` / `GOSI_PROGRESSION_DAY`, each defaulting to
/// July 1st's component.
fn progression_policy() -> Result<ProgressionPolicy, String> {
    let default = ProgressionPolicy::july_first();
    let month = env_u32("GOSI_PROGRESSION_MONTH")?.unwrap_or(default.month());
    let day = env_u32("GOSI_PROGRESSION_DAY")?.unwrap_or(default.day());
    ProgressionPolicy::new(month, day).map_err(|e| e.to_string())
}

fn auth_client() -> Result<Option<AuthClient>, Box<dyn std::error::Error>> {
    match AuthServiceConfig::from_env() {
        Ok(config) => {
            tracing::info!(base_url = %config.base_url, "auth service configured");
            Ok(Some(AuthClient::new(config)?))
        }
        Err(ConfigError::MissingUrl) => {
            tracing::info!("AUTH_SERVICE_URL not set; bearer tokens are not checked remotely");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .map(Zeroizing::new);
    let progression = progression_policy().map_err(|e| {
        tracing::error!("invalid progression policy: {e}");
        e
    })?;

    let config = AppConfig {
        port,
        auth_token,
        progression,
    };
    tracing::info!(?config, "configuration loaded");

    let auth_client = auth_client().map_err(|e| {
        tracing::error!("auth service configuration failed: {e}");
        e
    })?;

    let db_pool = aqlhr_api::db::init_pool().await.map_err(|e| {
        tracing::error!("database initialization failed: {e}");
        e
    })?;

    let state = AppState::with_config(config, auth_client, db_pool);
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("database hydration failed: {e}");
        e
    })?;

    let app = aqlhr_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("AqlHR API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
