//! # Integration Tests for aqlhr-api
//!
//! Drives the assembled router: the KPI pipeline end to end, GOSI rate
//! progression and the calendar-gated job, preview validation, CORS,
//! static-token and auth-service authentication, and the operational
//! endpoints.

use aqlhr_api::state::{AppConfig, AppState};
use aqlhr_auth_client::{AuthClient, AuthServiceConfig};
use aqlhr_gosi::ProgressionPolicy;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Datelike, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

const COMPANY: &str = "1d7e4c2b-3a5f-4e6d-8b9c-0f1e2d3c4b5a";

/// Build the app with auth disabled, returning a handle on its state.
fn test_app() -> (axum::Router, AppState) {
    let state = AppState::new();
    (aqlhr_api::app(state.clone()), state)
}

fn test_app_with_token(token: &str) -> axum::Router {
    let config = AppConfig {
        auth_token: Some(Zeroizing::new(token.to_string())),
        ..AppConfig::default()
    };
    aqlhr_api::app(AppState::with_config(config, None, None))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

async fn register_employee(app: &axum::Router, nationality: &str, hire_date: &str) -> String {
    let (status, body) = send(
        app,
        post(
            "/gosi-engine/register-employee",
            json!({
                "company_id": COMPANY,
                "full_name": "Khalid Al-Qahtani",
                "salary": 12000,
                "nationality": nationality,
                "hire_date": hire_date,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["employee"]["id"].as_str().unwrap().to_string()
}

// -- KPI pipeline -------------------------------------------------------------

#[tokio::test]
async fn kpi_compliance_example_scores_grade_a() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        post(
            "/kpi-engine/register-module-kpis",
            json!({
                "company_id": "acme",
                "module_name": "Payroll",
                "category": "Core HR",
                "kpis": [{"kpi_name": "Compliance %", "kpi_order": 1, "target_value": 100, "unit": "%"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["registered_count"], 1);

    let (status, _) = send(
        &app,
        post(
            "/kpi-engine/record-measurement",
            json!({"company_id": "acme", "module_name": "Payroll", "kpi_name": "Compliance %", "value": 97}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post("/kpi-engine/calculate-scores", json!({"company_id": "acme"}))).await;
    assert_eq!(status, StatusCode::OK);
    let module = &body["performance_scores"][0];
    assert_eq!(module["module_name"], "Payroll");
    assert_eq!(module["kpi_scores"][0]["score"], 97.0);
    assert_eq!(module["overall_score"], 97.0);
    assert_eq!(module["performance_grade"], "A");
}

#[tokio::test]
async fn unknown_kpi_writes_no_measurement() {
    let (app, state) = test_app();
    send(
        &app,
        post(
            "/kpi-engine/register-module-kpis",
            json!({"company_id": "acme", "module_name": "Payroll", "category": "Core HR", "kpis": []}),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post(
            "/kpi-engine/record-measurement",
            json!({"company_id": "acme", "module_name": "Payroll", "kpi_name": "Compliance %", "value": 97}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["error"].as_str().unwrap().contains("KPI not found"));
    assert!(state.measurements.is_empty());
}

#[tokio::test]
async fn out_of_order_measurement_keeps_latest_value() {
    let (app, state) = test_app();
    send(
        &app,
        post(
            "/kpi-engine/register-module-kpis",
            json!({
                "company_id": "acme",
                "module_name": "Attendance",
                "category": "Core HR",
                "kpis": [{"kpi_name": "Attendance Accuracy", "kpi_order": 1, "target_value": 100}]
            }),
        ),
    )
    .await;

    for (value, at) in [(96.0, "2026-03-02T08:00:00Z"), (80.0, "2026-03-01T08:00:00Z")] {
        let (status, _) = send(
            &app,
            post(
                "/kpi-engine/record-measurement",
                json!({
                    "company_id": "acme",
                    "module_name": "Attendance",
                    "kpi_name": "Attendance Accuracy",
                    "value": value,
                    "measured_at": at,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(state.measurements.len(), 2);
    assert_eq!(state.kpis.list()[0].current_value, Some(96.0));
}

// -- GOSI progression ---------------------------------------------------------

#[tokio::test]
async fn progression_moves_only_new_saudis_and_is_idempotent() {
    let (app, state) = test_app();
    let new_saudi = register_employee(&app, "SAUDI", "2024-09-01").await;
    let old_saudi = register_employee(&app, "SAUDI", "2019-05-01").await;
    let new_expat = register_employee(&app, "NON_SAUDI", "2024-09-01").await;

    let (status, _) = send(
        &app,
        post(
            "/gosi-engine/rate-history",
            json!({
                "system_type": "NEW",
                "nationality": "SAUDI",
                "employee_rate": 12.5,
                "employer_rate": 14.5,
                "effective_from": "2099-07-01",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, post("/gosi-engine/update-rates", json!({"effective_date": "2099-07-01"}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated_count"], 1);
    assert_eq!(body["updated_employees"][0]["employee_id"], new_saudi.as_str());

    let config = |id: &str| state.gosi_configs.get(&id.parse().unwrap()).unwrap();
    assert_eq!(config(&new_saudi).current_employee_rate.to_string(), "12.50");
    assert_ne!(config(&old_saudi).current_employee_rate.to_string(), "12.50");
    assert_eq!(config(&new_expat).current_employee_rate.to_string(), "0.00");
    assert_eq!(state.progression_events.len(), 1);

    // A second run finds nothing left to change.
    let (_, body) = send(&app, post("/gosi-engine/update-rates", json!({"effective_date": "2099-07-01"}))).await;
    assert_eq!(body["updated_count"], 0);
    assert_eq!(body["skipped_employee_ids"][0], new_saudi.as_str());
    assert_eq!(state.progression_events.len(), 1);
}

#[tokio::test]
async fn progression_without_rate_row_skips_everyone() {
    let (app, _) = test_app();
    let id = register_employee(&app, "SAUDI", "2024-09-01").await;

    let (status, body) = send(&app, post("/gosi-engine/update-rates", json!({"effective_date": "2031-01-15"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated_count"], 0);
    assert_eq!(body["failed_count"], 0);
    assert_eq!(body["skipped_employee_ids"], json!([id]));
}

#[tokio::test]
async fn progression_job_runs_only_on_policy_day() {
    let today = Utc::now().date_naive();
    let other = if (today.month(), today.day()) == (1, 15) { (1, 16) } else { (1, 15) };

    let off_day = AppConfig {
        progression: ProgressionPolicy::new(other.0, other.1).unwrap(),
        ..AppConfig::default()
    };
    let app = aqlhr_api::app(AppState::with_config(off_day, None, None));
    let (status, body) = send(&app, post("/gosi-engine/rate-progression-job", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executed"], false);
    assert!(body.get("result").is_none());

    // Feb 29 is never a valid policy day.
    let Ok(policy) = ProgressionPolicy::new(today.month(), today.day()) else {
        return;
    };
    let on_day = AppConfig {
        progression: policy,
        ..AppConfig::default()
    };
    let app = aqlhr_api::app(AppState::with_config(on_day, None, None));
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/gosi-engine/rate-progression-job")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["executed"], true);
    assert_eq!(body["run_date"], today.to_string());
    assert!(body["result"].is_object());
}

// -- GOSI calculation and preview --------------------------------------------

#[tokio::test]
async fn calculate_writes_one_audit_row() {
    let (app, state) = test_app();
    let id = register_employee(&app, "NON_SAUDI", "2020-01-01").await;
    let before = state.audit_log.len();

    let (status, body) = send(
        &app,
        post("/gosi-engine/calculate", json!({"employee_id": id, "salary": "12000"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["contributions"]["employee_contribution"], "0.00");
    assert_eq!(body["contributions"]["employer_contribution"], "240.00");
    assert_eq!(state.audit_log.len(), before + 1);
    assert_eq!(state.audit_log.broken_links(), 0);
}

#[tokio::test]
async fn preview_validates_company_uuid() {
    let (app, state) = test_app();
    let (status, body) = send(&app, post("/gosi-engine/preview", json!({"company_id": "not-a-uuid"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert!(state.audit_log.is_empty());
}

#[tokio::test]
async fn preview_does_not_audit() {
    let (app, state) = test_app();
    register_employee(&app, "SAUDI", "2020-01-01").await;
    let before = state.audit_log.len();

    let (status, body) = send(&app, post("/gosi-engine/preview", json!({"company_id": COMPANY}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["summary"]["total_employees"], 1);
    assert_eq!(state.audit_log.len(), before);
}

// -- CORS and authentication ----------------------------------------------------

#[tokio::test]
async fn cors_preflight_bypasses_auth() {
    let app = test_app_with_token("secret");
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/gosi-engine/calculate")
                .header("origin", "https://app.aqlhr.example")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "authorization, apikey, content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap();
    assert!(allowed.contains("x-client-info"));
    assert!(allowed.contains("apikey"));
}

#[tokio::test]
async fn static_token_is_required_when_configured() {
    let app = test_app_with_token("secret");
    let body = json!({"company_id": "acme"});

    let (status, resp) = send(&app, post("/kpi-engine/calculate-scores", body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["code"], "UNAUTHORIZED");

    let mut wrong = post("/kpi-engine/calculate-scores", body.clone());
    wrong
        .headers_mut()
        .insert("authorization", "Bearer nope".parse().unwrap());
    let (status, resp) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "invalid bearer token");

    let mut right = post("/kpi-engine/calculate-scores", body);
    right
        .headers_mut()
        .insert("authorization", "Bearer secret".parse().unwrap());
    let (status, resp) = send(&app, right).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["company_id"], "acme");
}

#[tokio::test]
async fn auth_service_token_records_user_as_actor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer user-jwt"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "email": "hr@example.sa"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(10)
        .mount(&mock_server)
        .await;

    let client = AuthClient::new(AuthServiceConfig::local_mock(&mock_server.uri(), "anon-key").unwrap()).unwrap();
    let state = AppState::with_config(AppConfig::default(), Some(client), None);
    let app = aqlhr_api::app(state.clone());

    let mut rejected = post("/gosi-engine/rate-history", json!({}));
    rejected
        .headers_mut()
        .insert("authorization", "Bearer expired".parse().unwrap());
    let (status, body) = send(&app, rejected).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let mut accepted = post(
        "/gosi-engine/register-employee",
        json!({
            "company_id": COMPANY,
            "full_name": "Noura Al-Otaibi",
            "salary": 9000,
            "nationality": "SAUDI",
            "hire_date": "2025-02-01",
        }),
    );
    accepted
        .headers_mut()
        .insert("authorization", "Bearer user-jwt".parse().unwrap());
    let (status, body) = send(&app, accepted).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let audit = state.audit_log.list();
    assert_eq!(
        audit.last().unwrap().actor_id.as_deref(),
        Some("550e8400-e29b-41d4-a716-446655440000")
    );
}

// -- Operational endpoints ----------------------------------------------------

#[tokio::test]
async fn health_probes_skip_auth() {
    let app = test_app_with_token("secret");
    let (status, body) = send(&app, get("/health/liveness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, body) = send(&app, get("/health/readiness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

#[tokio::test]
async fn metrics_expose_http_and_domain_series() {
    let (app, _) = test_app();
    register_employee(&app, "SAUDI", "2024-09-01").await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("aqlhr_http_requests_total"));
    assert!(text.contains("/gosi-engine/register-employee"));
    assert!(text.contains("aqlhr_gosi_employees_total{nationality=\"SAUDI\",system_type=\"NEW\"} 1"));
    assert!(text.contains("aqlhr_audit_trail_entries_total 1"));
}

#[tokio::test]
async fn openapi_is_public() {
    let app = test_app_with_token("secret");
    let (status, body) = send(&app, get("/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/kpi-engine/calculate-scores"].is_object());
}
