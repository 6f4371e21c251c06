//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented engine routes into one spec, served at
//! `/openapi.json` outside the auth layer.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Auth service access token, or the AUTH_TOKEN service token.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AqlHR Engines API",
        version = "0.1.0",
        description = "GOSI contribution engine and KPI scoring pipeline."
    ),
    paths(
        // GOSI
        crate::routes::gosi::calculate,
        crate::routes::gosi::preview,
        crate::routes::gosi::update_rates,
        crate::routes::gosi::employee_classification,
        crate::routes::gosi::rate_progression_job,
        crate::routes::gosi::register_employee,
        crate::routes::gosi::list_rate_history,
        crate::routes::gosi::append_rate_history,
        // KPI
        crate::routes::kpi::register_module_kpis,
        crate::routes::kpi::bulk_register,
        crate::routes::kpi::record_measurement,
        crate::routes::kpi::sync_kpi_data,
        crate::routes::kpi::calculate_scores,
        crate::routes::kpi::get_module_performance,
    ),
    components(schemas(
        crate::error::ErrorBody,
        // GOSI DTOs
        crate::routes::gosi::CalculateRequest,
        crate::routes::gosi::PreviewRequest,
        crate::routes::gosi::UpdateRatesRequest,
        crate::routes::gosi::RegisterEmployeeRequest,
        crate::routes::gosi::AppendRateRequest,
        crate::orchestration::gosi::ContributionResult,
        crate::orchestration::gosi::UpdateRatesResponse,
        crate::orchestration::gosi::ProgressionJobResponse,
        crate::orchestration::gosi::EmployeeClassification,
        crate::orchestration::gosi::RegisteredEmployee,
        // KPI DTOs
        crate::routes::kpi::RegisterModuleKpisRequest,
        crate::routes::kpi::BulkRegisterRequest,
        crate::routes::kpi::RecordMeasurementRequest,
        crate::routes::kpi::CompanyRequest,
        crate::orchestration::kpi::ModuleRegistration,
        crate::orchestration::kpi::RegisteredModule,
        crate::orchestration::kpi::BulkRegisterResponse,
        crate::orchestration::kpi::RecordedMeasurement,
        crate::orchestration::kpi::SyncResponse,
        crate::orchestration::kpi::PerformanceScores,
        crate::orchestration::kpi::ModuleDetail,
        crate::orchestration::kpi::ModulePerformanceResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "gosi", description = "GOSI contribution engine"),
        (name = "kpi", description = "KPI scoring pipeline"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
