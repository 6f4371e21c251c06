//! # aqlhr-api: AqlHR Engines over HTTP
//!
//! Serves the GOSI contribution engine and the KPI scoring pipeline.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/gosi-engine/*` | [`routes::gosi`] | GOSI contributions and rate progression |
//! | `/kpi-engine/*` | [`routes::kpi`] | KPI registry, measurements, scoring |
//! | `/health/*`, `/metrics`, `/openapi.json` | this module, [`openapi`] | Operational, unauthenticated |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Cors → TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! CORS is outermost so preflight requests are answered before auth runs.

pub mod audit;
pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health probes, `/metrics` and `/openapi.json` are mounted outside the
/// auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
        client: state.auth_client.clone(),
    };
    if !auth_config.is_enabled() {
        tracing::warn!("no AUTH_TOKEN or auth service configured; authentication is disabled");
    }
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::gosi::router())
        .merge(routes::kpi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .route("/metrics", axum::routing::get(prometheus_metrics))
        .merge(openapi::router())
        .layer(Extension(metrics))
        .with_state(state);

    Router::new()
        .merge(unauthenticated)
        .merge(api)
        .layer(cors_layer())
}

/// Any origin, with the headers browser clients of the engines send.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

/// GET /metrics: refresh domain gauges from the stores, then encode.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    let mut by_class: HashMap<(&'static str, &'static str), usize> = HashMap::new();
    for employee in state.employees.filter(|e| e.is_active) {
        if let Some(config) = state.gosi_configs.get(employee.id.as_uuid()) {
            *by_class
                .entry((config.gosi_system_type.as_str(), config.nationality.as_str()))
                .or_default() += 1;
        }
    }
    metrics.gosi_employees_total().reset();
    for ((system_type, nationality), count) in &by_class {
        metrics
            .gosi_employees_total()
            .with_label_values(&[*system_type, *nationality])
            .set(*count as f64);
    }

    metrics
        .rate_progression_events_total()
        .set(state.progression_events.len() as f64);
    metrics.kpi_modules_total().set(state.modules.len() as f64);
    metrics.kpis_total().set(state.kpis.len() as f64);
    metrics
        .kpi_measurements_total()
        .set(state.measurements.len() as f64);
    metrics
        .audit_trail_entries_total()
        .set(state.audit_log.len() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

async fn liveness() -> &'static str {
    "ok"
}

/// Readiness: the rate schedule is loaded and, when configured, the
/// database answers.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let schedule_loaded = !state.rate_schedule.read().is_empty();
    if !schedule_loaded {
        return (StatusCode::SERVICE_UNAVAILABLE, "rate schedule empty").into_response();
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
