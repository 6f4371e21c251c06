//! # GOSI Contribution Engine API
//!
//! - `POST /gosi-engine/calculate`: one employee's contribution (audited)
//! - `POST /gosi-engine/preview`: company-wide contribution preview
//! - `POST /gosi-engine/update-rates`: move NEW/SAUDI employees to a rate row
//! - `GET  /gosi-engine/employee-classification?employee_id=`: employee + rate snapshot
//! - `POST /gosi-engine/rate-progression-job`: calendar-gated progression
//! - `POST /gosi-engine/register-employee`: add an employee and its config
//! - `GET  /gosi-engine/rate-history`: list the rate schedule
//! - `POST /gosi-engine/rate-history`: append a schedule row

use aqlhr_core::{Amount, CompanyId, EmployeeId, RatePercent};
use aqlhr_gosi::{CompanyPreview, Nationality, RateHistoryEntry, RatePair, SystemType};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::orchestration::gosi::{
    self as engine, ContributionResult, EmployeeClassification, NewEmployee,
    ProgressionJobResponse, RegisteredEmployee, UpdateRatesResponse,
};
use crate::state::AppState;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::InvalidArgument(err.body_text()))
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateRequest {
    pub employee_id: String,
    /// SAR, as a JSON number or decimal string.
    #[schema(value_type = String, example = "10000.00")]
    pub salary: Amount,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
}

impl Validate for CalculateRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("employee_id", &self.employee_id)?;
        if self.salary.is_negative() {
            return Err("salary must not be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub company_id: String,
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
}

impl Validate for PreviewRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRatesRequest {
    pub effective_date: NaiveDate,
}

impl Validate for UpdateRatesRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassificationQuery {
    pub employee_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterEmployeeRequest {
    pub company_id: String,
    pub full_name: String,
    #[schema(value_type = String, example = "9000.00")]
    pub salary: Amount,
    #[schema(value_type = String, example = "SAUDI")]
    pub nationality: Nationality,
    pub hire_date: NaiveDate,
}

impl Validate for RegisterEmployeeRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("company_id", &self.company_id)?;
        require_non_blank("full_name", &self.full_name)?;
        if self.salary.is_negative() {
            return Err("salary must not be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RateHistoryQuery {
    /// `OLD` or `NEW`.
    pub system_type: Option<String>,
    /// `SAUDI` or `NON_SAUDI`.
    pub nationality: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AppendRateRequest {
    #[schema(value_type = String, example = "NEW")]
    pub system_type: SystemType,
    #[schema(value_type = String, example = "SAUDI")]
    pub nationality: Nationality,
    /// Percent of salary, e.g. `12.25`.
    #[schema(value_type = f64)]
    pub employee_rate: RatePercent,
    #[schema(value_type = f64)]
    pub employer_rate: RatePercent,
    pub effective_from: NaiveDate,
}

impl Validate for AppendRateRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gosi-engine/calculate", post(calculate))
        .route("/gosi-engine/preview", post(preview))
        .route("/gosi-engine/update-rates", post(update_rates))
        .route(
            "/gosi-engine/employee-classification",
            get(employee_classification),
        )
        .route(
            "/gosi-engine/rate-progression-job",
            post(rate_progression_job),
        )
        .route("/gosi-engine/register-employee", post(register_employee))
        .route(
            "/gosi-engine/rate-history",
            get(list_rate_history).post(append_rate_history),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /gosi-engine/calculate
#[utoipa::path(
    post,
    path = "/gosi-engine/calculate",
    request_body = CalculateRequest,
    responses(
        (status = 200, description = "Contribution breakdown", body = ContributionResult),
        (status = 400, description = "Invalid input, unauthorized, or no config/rate", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn calculate(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<ContributionResult>, AppError> {
    let req = extract_validated_json(body)?;
    let employee_id = EmployeeId::parse(&req.employee_id)?;
    let as_of = req.as_of_date.unwrap_or_else(today);
    let result = engine::calculate(&state, &caller, employee_id, req.salary, as_of).await?;
    Ok(Json(result))
}

/// POST /gosi-engine/preview
#[utoipa::path(
    post,
    path = "/gosi-engine/preview",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Per-employee rows and company totals"),
        (status = 400, description = "company_id is not a UUID", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn preview(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<CompanyPreview>, AppError> {
    let req = extract_validated_json(body)?;
    let as_of = req.as_of_date.unwrap_or_else(today);
    let preview = engine::preview(&state, &req.company_id, as_of)?;
    Ok(Json(preview))
}

/// POST /gosi-engine/update-rates
#[utoipa::path(
    post,
    path = "/gosi-engine/update-rates",
    request_body = UpdateRatesRequest,
    responses(
        (status = 200, description = "Per-employee outcomes", body = UpdateRatesResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn update_rates(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    body: Result<Json<UpdateRatesRequest>, JsonRejection>,
) -> Result<Json<UpdateRatesResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let result = engine::update_rates(&state, req.effective_date).await?;
    Ok(Json(result))
}

/// GET /gosi-engine/employee-classification
#[utoipa::path(
    get,
    path = "/gosi-engine/employee-classification",
    params(ClassificationQuery),
    responses(
        (status = 200, description = "Employee and current rates", body = EmployeeClassification),
        (status = 400, description = "Bad id or unknown employee", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn employee_classification(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    query: Result<Query<ClassificationQuery>, QueryRejection>,
) -> Result<Json<EmployeeClassification>, AppError> {
    let query = extract_query(query)?;
    let employee_id = EmployeeId::parse(&query.employee_id)?;
    let result = engine::classify_employee(&state, employee_id, today())?;
    Ok(Json(result))
}

/// POST /gosi-engine/rate-progression-job: runs only on the policy date.
#[utoipa::path(
    post,
    path = "/gosi-engine/rate-progression-job",
    responses(
        (status = 200, description = "Executed or skipped", body = ProgressionJobResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn rate_progression_job(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> Result<Json<ProgressionJobResponse>, AppError> {
    let result = engine::run_progression_job(&state, today()).await?;
    Ok(Json(result))
}

/// POST /gosi-engine/register-employee
#[utoipa::path(
    post,
    path = "/gosi-engine/register-employee",
    request_body = RegisterEmployeeRequest,
    responses(
        (status = 201, description = "Employee registered", body = RegisteredEmployee),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn register_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RegisterEmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredEmployee>), AppError> {
    let req = extract_validated_json(body)?;
    let input = NewEmployee {
        company_id: CompanyId::parse(&req.company_id)?,
        full_name: req.full_name.trim().to_string(),
        salary: req.salary,
        nationality: req.nationality,
        hire_date: req.hire_date,
    };
    let registered = engine::register_employee(&state, &caller, input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /gosi-engine/rate-history
#[utoipa::path(
    get,
    path = "/gosi-engine/rate-history",
    params(RateHistoryQuery),
    responses(
        (status = 200, description = "Schedule rows ordered by effective_from"),
        (status = 400, description = "Unknown filter value", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn list_rate_history(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    query: Result<Query<RateHistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<RateHistoryEntry>>, AppError> {
    let query = extract_query(query)?;
    let system_type = query
        .system_type
        .as_deref()
        .map(str::parse::<SystemType>)
        .transpose()
        .map_err(AppError::InvalidArgument)?;
    let nationality = query
        .nationality
        .as_deref()
        .map(str::parse::<Nationality>)
        .transpose()
        .map_err(AppError::InvalidArgument)?;
    Ok(Json(engine::list_rate_history(&state, system_type, nationality)))
}

/// POST /gosi-engine/rate-history
#[utoipa::path(
    post,
    path = "/gosi-engine/rate-history",
    request_body = AppendRateRequest,
    responses(
        (status = 201, description = "Row appended"),
        (status = 400, description = "Duplicate row or invalid rate", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "gosi"
)]
async fn append_rate_history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<AppendRateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RateHistoryEntry>), AppError> {
    let req = extract_validated_json(body)?;
    let entry = RateHistoryEntry::new(
        req.system_type,
        req.nationality,
        RatePair::new(req.employee_rate, req.employer_rate),
        req.effective_from,
    );
    let stored = engine::append_rate_history(&state, &caller, entry).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
