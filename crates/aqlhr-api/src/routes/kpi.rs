//! # KPI Scoring Pipeline API
//!
//! - `POST /kpi-engine/register-module-kpis`: upsert a module and its KPIs
//! - `POST /kpi-engine/bulk-register`: register many modules, fail-soft
//! - `POST /kpi-engine/record-measurement`: append a measurement
//! - `POST /kpi-engine/sync-kpi-data`: record the feed's samples, fail-soft
//! - `POST /kpi-engine/calculate-scores`: per-module scores and grades
//! - `GET  /kpi-engine/get-module-performance?company_id=&module_name=`

use aqlhr_kpi::KpiDefinition;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::orchestration::kpi::{
    self as engine, BulkRegisterResponse, MeasurementInput, ModulePerformanceResponse,
    ModuleRegistration, PerformanceScores, RecordedMeasurement, RegisteredModule, SyncResponse,
};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterModuleKpisRequest {
    pub company_id: String,
    pub module_name: String,
    pub category: String,
    #[serde(default)]
    pub module_name_ar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `{kpi_name, kpi_order, target_value?, unit?, direction?, ...}`
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub kpis: Vec<KpiDefinition>,
}

impl Validate for RegisterModuleKpisRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)
    }
}

impl RegisterModuleKpisRequest {
    fn into_parts(self) -> (String, ModuleRegistration) {
        (
            self.company_id,
            ModuleRegistration {
                module_name: self.module_name,
                category: self.category,
                module_name_ar: self.module_name_ar,
                description: self.description,
                kpis: self.kpis,
            },
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkRegisterRequest {
    pub company_id: String,
    pub modules: Vec<ModuleRegistration>,
}

impl Validate for BulkRegisterRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordMeasurementRequest {
    pub company_id: String,
    pub module_name: String,
    pub kpi_name: String,
    pub value: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub measured_at: Option<DateTime<Utc>>,
}

impl Validate for RecordMeasurementRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)?;
        require_non_blank("module_name", &self.module_name)?;
        require_non_blank("kpi_name", &self.kpi_name)
    }
}

impl From<RecordMeasurementRequest> for MeasurementInput {
    fn from(req: RecordMeasurementRequest) -> Self {
        Self {
            company_id: req.company_id,
            module_name: req.module_name,
            kpi_name: req.kpi_name,
            value: req.value,
            source: req.source,
            notes: req.notes,
            measured_at: req.measured_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompanyRequest {
    pub company_id: String,
}

impl Validate for CompanyRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ModulePerformanceQuery {
    pub company_id: String,
    pub module_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kpi-engine/register-module-kpis", post(register_module_kpis))
        .route("/kpi-engine/bulk-register", post(bulk_register))
        .route("/kpi-engine/record-measurement", post(record_measurement))
        .route("/kpi-engine/sync-kpi-data", post(sync_kpi_data))
        .route("/kpi-engine/calculate-scores", post(calculate_scores))
        .route(
            "/kpi-engine/get-module-performance",
            get(get_module_performance),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /kpi-engine/register-module-kpis
#[utoipa::path(
    post,
    path = "/kpi-engine/register-module-kpis",
    request_body = RegisterModuleKpisRequest,
    responses(
        (status = 200, description = "Module and KPIs upserted", body = RegisteredModule),
        (status = 400, description = "Invalid definition", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn register_module_kpis(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<RegisterModuleKpisRequest>, JsonRejection>,
) -> Result<Json<RegisteredModule>, AppError> {
    let (company_id, registration) = extract_validated_json(body)?.into_parts();
    let result = engine::register_module_kpis(&state, &company_id, registration).await?;
    Ok(Json(result))
}

/// POST /kpi-engine/bulk-register
#[utoipa::path(
    post,
    path = "/kpi-engine/bulk-register",
    request_body = BulkRegisterRequest,
    responses(
        (status = 200, description = "Per-module results", body = BulkRegisterResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn bulk_register(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<BulkRegisterRequest>, JsonRejection>,
) -> Result<Json<BulkRegisterResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let result = engine::bulk_register(&state, &req.company_id, req.modules).await?;
    Ok(Json(result))
}

/// POST /kpi-engine/record-measurement
#[utoipa::path(
    post,
    path = "/kpi-engine/record-measurement",
    request_body = RecordMeasurementRequest,
    responses(
        (status = 200, description = "Measurement stored", body = RecordedMeasurement),
        (status = 400, description = "KPI not found or invalid value", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn record_measurement(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<RecordMeasurementRequest>, JsonRejection>,
) -> Result<Json<RecordedMeasurement>, AppError> {
    let req = extract_validated_json(body)?;
    let result = engine::record_measurement(&state, req.into()).await?;
    Ok(Json(result))
}

/// POST /kpi-engine/sync-kpi-data
#[utoipa::path(
    post,
    path = "/kpi-engine/sync-kpi-data",
    request_body = CompanyRequest,
    responses(
        (status = 200, description = "Per-sample results", body = SyncResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn sync_kpi_data(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<CompanyRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let result = engine::sync_kpi_data(&state, &req.company_id).await?;
    Ok(Json(result))
}

/// POST /kpi-engine/calculate-scores
#[utoipa::path(
    post,
    path = "/kpi-engine/calculate-scores",
    request_body = CompanyRequest,
    responses(
        (status = 200, description = "Module scores and grades", body = PerformanceScores),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn calculate_scores(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<CompanyRequest>, JsonRejection>,
) -> Result<Json<PerformanceScores>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(engine::calculate_scores(&state, &req.company_id)?))
}

/// GET /kpi-engine/get-module-performance
#[utoipa::path(
    get,
    path = "/kpi-engine/get-module-performance",
    params(ModulePerformanceQuery),
    responses(
        (status = 200, description = "Modules with KPIs and scores", body = ModulePerformanceResponse),
        (status = 400, description = "Unknown module", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "kpi"
)]
async fn get_module_performance(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    query: Result<Query<ModulePerformanceQuery>, QueryRejection>,
) -> Result<Json<ModulePerformanceResponse>, AppError> {
    let Query(query) = query.map_err(|err| AppError::InvalidArgument(err.body_text()))?;
    let result =
        engine::get_module_performance(&state, &query.company_id, query.module_name.as_deref())?;
    Ok(Json(result))
}
