//! GOSI engine orchestration: contribution calculation, company preview,
//! rate progression, classification, registration, and the rate schedule.

use aqlhr_core::{Amount, CompanyId, EmployeeId};
use aqlhr_gosi::{
    build_preview, compute_contribution, initial_config, plan_progression, resolve_rates,
    CompanyPreview, ContributionBreakdown, Employee, EmployeeGosiConfig, GosiError, Nationality,
    ProgressionOutcome, ProgressionReport, RateChange, RateHistoryEntry, RatePair,
    RateProgressionEvent, RateSnapshot, RateSource, SystemType,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{persist_error, record_audit};
use crate::audit::AuditEvent;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

pub const CALCULATION_EVENT: &str = "gosi_calculation";
pub const RATE_HISTORY_EVENT: &str = "gosi_rate_history";
pub const REGISTRATION_EVENT: &str = "gosi_employee_registration";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One employee's contribution on one date.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContributionResult {
    #[schema(value_type = String)]
    pub employee_id: EmployeeId,
    #[schema(value_type = String, example = "NEW")]
    pub system_type: SystemType,
    #[schema(value_type = String, example = "SAUDI")]
    pub nationality: Nationality,
    /// Decimal string in SAR.
    #[schema(value_type = String, example = "12000.00")]
    pub salary: Amount,
    pub as_of_date: NaiveDate,
    /// Rates in percent.
    #[schema(value_type = Object)]
    pub rates: RatePair,
    /// Start date of the rate row that applied.
    pub rate_effective_from: NaiveDate,
    #[schema(value_type = String)]
    pub rate_source: RateSource,
    #[schema(value_type = Object)]
    pub contributions: ContributionBreakdown,
    /// Audit record written for this calculation.
    pub audit_id: Uuid,
}

/// Outcome of a progression run, one tagged item per eligible employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRatesResponse {
    pub effective_date: NaiveDate,
    pub updated_count: usize,
    #[schema(value_type = Vec<Object>)]
    pub updated_employees: Vec<RateChange>,
    #[schema(value_type = Vec<String>)]
    pub skipped_employee_ids: Vec<EmployeeId>,
    pub failed_count: usize,
    /// `{"status": "updated" | "skipped" | "failed", ...}` per employee.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<ProgressionOutcome>,
}

impl From<ProgressionReport> for UpdateRatesResponse {
    fn from(report: ProgressionReport) -> Self {
        Self {
            effective_date: report.effective_date,
            updated_count: report.updated_count,
            updated_employees: report.updated_employees,
            skipped_employee_ids: report.skipped_employee_ids,
            failed_count: report.failed_count,
            results: report.results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressionJobResponse {
    /// Whether `run_date` was the progression day.
    pub executed: bool,
    pub run_date: NaiveDate,
    /// Configured progression day as `--MM-DD`.
    #[schema(example = "--07-01")]
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<UpdateRatesResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeClassification {
    #[schema(value_type = Object)]
    pub employee: Employee,
    #[schema(value_type = Object)]
    pub config: EmployeeGosiConfig,
    /// Rates in force today.
    #[schema(value_type = Object)]
    pub current_rates: RateSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisteredEmployee {
    #[schema(value_type = Object)]
    pub employee: Employee,
    #[schema(value_type = Object)]
    pub config: EmployeeGosiConfig,
}

/// Input for [`register_employee`].
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub company_id: CompanyId,
    pub full_name: String,
    pub salary: Amount,
    pub nationality: Nationality,
    pub hire_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Calculation and preview
// ---------------------------------------------------------------------------

/// Compute one employee's contribution and write an audit record.
pub async fn calculate(
    state: &AppState,
    caller: &CallerIdentity,
    employee_id: EmployeeId,
    salary: Amount,
    as_of: NaiveDate,
) -> Result<ContributionResult, AppError> {
    let config = state
        .gosi_configs
        .get(employee_id.as_uuid())
        .ok_or(GosiError::ConfigNotFound(employee_id))?;

    let snapshot = {
        let schedule = state.rate_schedule.read();
        resolve_rates(&config, &schedule, as_of)?
    };
    let contributions = compute_contribution(salary, snapshot.rates);

    let audit = record_audit(
        state,
        AuditEvent {
            event_type: CALCULATION_EVENT.to_string(),
            actor_id: caller.actor_id(),
            resource_type: "employee".to_string(),
            resource_id: *employee_id.as_uuid(),
            action: "calculate".to_string(),
            metadata: serde_json::json!({
                "salary": salary,
                "as_of_date": as_of,
                "system_type": snapshot.system_type,
                "nationality": snapshot.nationality,
                "rates": snapshot.rates,
                "contributions": contributions,
            }),
        },
    )
    .await?;

    tracing::info!(
        employee_id = %employee_id,
        as_of = %as_of,
        total = %contributions.total,
        "GOSI contribution calculated"
    );

    Ok(ContributionResult {
        employee_id,
        system_type: snapshot.system_type,
        nationality: snapshot.nationality,
        salary,
        as_of_date: as_of,
        rates: snapshot.rates,
        rate_effective_from: snapshot.effective_from,
        rate_source: snapshot.source,
        contributions,
        audit_id: audit.id,
    })
}

/// Company-wide contribution preview. Never audit-logged.
pub fn preview(state: &AppState, company_id: &str, as_of: NaiveDate) -> Result<CompanyPreview, AppError> {
    let company_id = CompanyId::parse(company_id)?;

    let roster: Vec<(Employee, Option<EmployeeGosiConfig>)> = state
        .employees
        .filter(|e| e.company_id == company_id && e.is_active)
        .into_iter()
        .map(|e| {
            let config = state.gosi_configs.get(e.id.as_uuid());
            (e, config)
        })
        .collect();

    let schedule = state.rate_schedule.read();
    Ok(build_preview(company_id, &roster, &schedule, as_of))
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Move every NEW-system Saudi employee to the rate row starting on
/// `effective_date`.
///
/// Employees are processed one at a time. A failed write marks that
/// employee `failed` and the loop continues.
pub async fn update_rates(
    state: &AppState,
    effective_date: NaiveDate,
) -> Result<UpdateRatesResponse, AppError> {
    let _run = state.progression_lock.lock().await;

    let configs = state.gosi_configs.filter(EmployeeGosiConfig::is_progression_eligible);
    let plan = {
        let schedule = state.rate_schedule.read();
        plan_progression(&configs, &schedule, effective_date)
    };

    let mut results = Vec::with_capacity(plan.len());
    for outcome in plan {
        let outcome = match outcome {
            ProgressionOutcome::Updated(change) => apply_change(state, change).await,
            ProgressionOutcome::Skipped {
                employee_id,
                reason,
            } => {
                tracing::info!(employee_id = %employee_id, reason = %reason, "rate progression skipped");
                ProgressionOutcome::Skipped {
                    employee_id,
                    reason,
                }
            }
            failed => failed,
        };
        results.push(outcome);
    }

    let report = ProgressionReport::from_outcomes(effective_date, results);
    tracing::info!(
        effective_date = %effective_date,
        updated = report.updated_count,
        skipped = report.skipped_employee_ids.len(),
        failed = report.failed_count,
        "rate progression finished"
    );
    Ok(report.into())
}

async fn apply_change(state: &AppState, change: RateChange) -> ProgressionOutcome {
    let employee_id = change.employee_id;
    let now = Utc::now();

    let mut config = match state.gosi_configs.get(employee_id.as_uuid()) {
        Some(config) => config,
        None => {
            return ProgressionOutcome::Failed {
                employee_id,
                error: GosiError::ConfigNotFound(employee_id).to_string(),
            }
        }
    };
    change.apply(&mut config, now);
    let event = RateProgressionEvent::from_change(&change, now);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::gosi::apply_rate_change(pool, &config, &event).await {
            tracing::error!(employee_id = %employee_id, error = %e, "failed to persist rate progression");
            return ProgressionOutcome::Failed {
                employee_id,
                error: format!("persistence failed: {e}"),
            };
        }
    }

    state.gosi_configs.insert(*employee_id.as_uuid(), config);
    state.progression_events.insert(event.id, event);

    tracing::info!(
        employee_id = %employee_id,
        old_employee_rate = %change.old_rates.employee_rate,
        new_employee_rate = %change.new_rates.employee_rate,
        effective_from = %change.effective_from,
        "GOSI rates progressed"
    );
    ProgressionOutcome::Updated(change)
}

/// The scheduled job: run progression for `today` only if it is the
/// configured progression day.
pub async fn run_progression_job(
    state: &AppState,
    today: NaiveDate,
) -> Result<ProgressionJobResponse, AppError> {
    let policy = state.config.progression;
    if !policy.matches(today) {
        tracing::debug!(today = %today, policy = %policy, "not the progression day");
        return Ok(ProgressionJobResponse {
            executed: false,
            run_date: today,
            policy: policy.to_string(),
            result: None,
        });
    }

    let result = update_rates(state, today).await?;
    Ok(ProgressionJobResponse {
        executed: true,
        run_date: today,
        policy: policy.to_string(),
        result: Some(result),
    })
}

// ---------------------------------------------------------------------------
// Roster and schedule
// ---------------------------------------------------------------------------

pub fn classify_employee(
    state: &AppState,
    employee_id: EmployeeId,
    today: NaiveDate,
) -> Result<EmployeeClassification, AppError> {
    let employee = state
        .employees
        .get(employee_id.as_uuid())
        .ok_or(GosiError::EmployeeNotFound(employee_id))?;
    let config = state
        .gosi_configs
        .get(employee_id.as_uuid())
        .ok_or(GosiError::ConfigNotFound(employee_id))?;
    let current_rates = {
        let schedule = state.rate_schedule.read();
        resolve_rates(&config, &schedule, today)?
    };

    Ok(EmployeeClassification {
        employee,
        config,
        current_rates,
    })
}

pub async fn register_employee(
    state: &AppState,
    caller: &CallerIdentity,
    input: NewEmployee,
    now: DateTime<Utc>,
) -> Result<RegisteredEmployee, AppError> {
    let employee = Employee {
        id: EmployeeId::new(),
        company_id: input.company_id,
        full_name: input.full_name.trim().to_string(),
        salary: input.salary,
        is_active: true,
        created_at: now,
    };
    let config = {
        let schedule = state.rate_schedule.read();
        initial_config(employee.id, input.nationality, input.hire_date, &schedule, now)?
    };

    if let Some(pool) = &state.db_pool {
        crate::db::gosi::register_employee(pool, &employee, &config)
            .await
            .map_err(|e| persist_error("employee", e))?;
    }
    state.employees.insert(*employee.id.as_uuid(), employee.clone());
    state.gosi_configs.insert(*employee.id.as_uuid(), config.clone());

    record_audit(
        state,
        AuditEvent {
            event_type: REGISTRATION_EVENT.to_string(),
            actor_id: caller.actor_id(),
            resource_type: "employee".to_string(),
            resource_id: *employee.id.as_uuid(),
            action: "register".to_string(),
            metadata: serde_json::json!({
                "company_id": employee.company_id,
                "system_type": config.gosi_system_type,
                "nationality": config.nationality,
                "hire_date": config.hire_date,
            }),
        },
    )
    .await?;

    tracing::info!(
        employee_id = %employee.id,
        company_id = %employee.company_id,
        system_type = %config.gosi_system_type,
        "employee registered"
    );
    Ok(RegisteredEmployee { employee, config })
}

pub fn list_rate_history(
    state: &AppState,
    system_type: Option<SystemType>,
    nationality: Option<Nationality>,
) -> Vec<RateHistoryEntry> {
    let mut rows = state.rate_schedule.read().filtered(system_type, nationality);
    rows.sort_by(|a, b| {
        a.effective_from
            .cmp(&b.effective_from)
            .then_with(|| a.system_type.cmp(&b.system_type))
            .then_with(|| a.nationality.cmp(&b.nationality))
    });
    rows
}

/// Append a schedule row. Duplicate triples are rejected.
pub async fn append_rate_history(
    state: &AppState,
    caller: &CallerIdentity,
    entry: RateHistoryEntry,
) -> Result<RateHistoryEntry, AppError> {
    let duplicate = || GosiError::DuplicateRate {
        system_type: entry.system_type,
        nationality: entry.nationality,
        effective_from: entry.effective_from,
    };

    let exists = {
        let schedule = state.rate_schedule.read();
        schedule
            .exact(entry.system_type, entry.nationality, entry.effective_from)
            .is_some()
    };
    if exists {
        return Err(duplicate().into());
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::gosi::insert_rate(pool, &entry).await {
            let unique = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if unique {
                return Err(duplicate().into());
            }
            return Err(persist_error("rate history", e));
        }
    }
    {
        let mut schedule = state.rate_schedule.write();
        schedule.insert(entry.clone())?;
    }

    record_audit(
        state,
        AuditEvent {
            event_type: RATE_HISTORY_EVENT.to_string(),
            actor_id: caller.actor_id(),
            resource_type: "gosi_rate_history".to_string(),
            resource_id: entry.id,
            action: "append".to_string(),
            metadata: serde_json::json!({
                "system_type": entry.system_type,
                "nationality": entry.nationality,
                "employee_rate": entry.employee_rate,
                "employer_rate": entry.employer_rate,
                "effective_from": entry.effective_from,
            }),
        },
    )
    .await?;

    tracing::info!(
        system_type = %entry.system_type,
        nationality = %entry.nationality,
        effective_from = %entry.effective_from,
        "rate history row appended"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CallerKind;
    use aqlhr_core::RatePercent;
    use aqlhr_gosi::ProgressionPolicy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn caller() -> CallerIdentity {
        CallerIdentity {
            kind: CallerKind::User,
            user_id: Some("user-42".into()),
            email: None,
        }
    }

    async fn hire(
        state: &AppState,
        company: CompanyId,
        name: &str,
        nationality: Nationality,
        hire_date: NaiveDate,
    ) -> RegisteredEmployee {
        register_employee(
            state,
            &caller(),
            NewEmployee {
                company_id: company,
                full_name: name.into(),
                salary: Amount::parse("10000").unwrap(),
                nationality,
                hire_date,
            },
            registered_at(),
        )
        .await
        .unwrap()
    }

    /// Fixed registration clock so seeded rates do not depend on today.
    fn registered_at() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2024, 8, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn calculate_writes_one_audit_row_with_actor() {
        let state = AppState::new();
        let reg = hire(&state, CompanyId::new(), "Sara", Nationality::Saudi, date(2020, 1, 1)).await;
        let before = state.audit_log.len();

        let result = calculate(
            &state,
            &caller(),
            reg.employee.id,
            Amount::parse("12000").unwrap(),
            date(2025, 1, 1),
        )
        .await
        .unwrap();

        assert_eq!(result.system_type, SystemType::Old);
        assert_eq!(result.contributions.employee_contribution.to_string(), "1170.00");
        assert_eq!(result.contributions.employer_contribution.to_string(), "1410.00");
        assert_eq!(state.audit_log.len(), before + 1);

        let rows = state
            .audit_log
            .for_resource("employee", *reg.employee.id.as_uuid());
        let calc = rows.iter().find(|r| r.event_type == CALCULATION_EVENT).unwrap();
        assert_eq!(calc.actor_id.as_deref(), Some("user-42"));
        assert_eq!(calc.id, result.audit_id);
        assert_eq!(state.audit_log.broken_links(), 0);
    }

    #[tokio::test]
    async fn calculate_without_config_is_not_found_and_not_audited() {
        let state = AppState::new();
        let err = calculate(
            &state,
            &caller(),
            EmployeeId::new(),
            Amount::parse("5000").unwrap(),
            date(2025, 1, 1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.audit_log.is_empty());
    }

    #[tokio::test]
    async fn new_system_rate_follows_schedule_by_date() {
        let state = AppState::new();
        let reg = hire(&state, CompanyId::new(), "Omar", Nationality::Saudi, date(2024, 8, 1)).await;
        let salary = Amount::parse("10000").unwrap();

        let before = calculate(&state, &caller(), reg.employee.id, salary, date(2025, 6, 30))
            .await
            .unwrap();
        let after = calculate(&state, &caller(), reg.employee.id, salary, date(2025, 7, 1))
            .await
            .unwrap();
        assert_eq!(before.rates.employee_rate.bps(), 975);
        assert_eq!(after.rates.employee_rate.bps(), 1025);
    }

    #[tokio::test]
    async fn preview_rejects_malformed_company_id() {
        let state = AppState::new();
        let err = preview(&state, "not-a-uuid", date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn preview_totals_match_rows_and_skip_audit() {
        let state = AppState::new();
        let company = CompanyId::new();
        hire(&state, company, "A", Nationality::Saudi, date(2019, 3, 1)).await;
        hire(&state, company, "B", Nationality::NonSaudi, date(2024, 9, 1)).await;
        hire(&state, CompanyId::new(), "Other", Nationality::Saudi, date(2019, 3, 1)).await;
        let audit_before = state.audit_log.len();

        let p = preview(&state, &company.to_string(), date(2025, 1, 1)).unwrap();
        assert_eq!(p.summary.total_employees, 2);
        assert_eq!(p.summary.saudi_count, 1);
        assert_eq!(p.summary.new_system_count, 1);
        let row_total: Amount = p.employees.iter().map(|r| r.contributions.total).sum();
        assert_eq!(p.summary.total_contributions, row_total);
        assert_eq!(state.audit_log.len(), audit_before);
    }

    #[tokio::test]
    async fn update_rates_touches_only_new_saudis() {
        let state = AppState::new();
        let company = CompanyId::new();
        let new_saudi = hire(&state, company, "N", Nationality::Saudi, date(2024, 8, 1)).await;
        let old_saudi = hire(&state, company, "O", Nationality::Saudi, date(2020, 1, 1)).await;
        let expat = hire(&state, company, "X", Nationality::NonSaudi, date(2024, 8, 1)).await;

        let old_before = state.gosi_configs.get(old_saudi.employee.id.as_uuid()).unwrap();
        let expat_before = state.gosi_configs.get(expat.employee.id.as_uuid()).unwrap();

        let report = update_rates(&state, date(2026, 7, 1)).await.unwrap();
        assert_eq!(report.updated_count, 1);
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.results.len(), 1);

        let cfg = state.gosi_configs.get(new_saudi.employee.id.as_uuid()).unwrap();
        assert_eq!(cfg.current_employee_rate, RatePercent::from_bps_clamped(1075));
        assert_eq!(cfg.effective_from, date(2026, 7, 1));
        assert_eq!(state.gosi_configs.get(old_saudi.employee.id.as_uuid()).unwrap(), old_before);
        assert_eq!(state.gosi_configs.get(expat.employee.id.as_uuid()).unwrap(), expat_before);

        let events = state.progression_events.list();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, "annual_rate_progression");
    }

    #[tokio::test]
    async fn update_rates_reports_skips() {
        let state = AppState::new();
        let reg = hire(&state, CompanyId::new(), "N", Nationality::Saudi, date(2024, 8, 1)).await;

        let report = update_rates(&state, date(2030, 7, 1)).await.unwrap();
        assert_eq!(report.updated_count, 0);
        assert_eq!(report.skipped_employee_ids, vec![reg.employee.id]);
        assert!(state.progression_events.is_empty());
    }

    #[tokio::test]
    async fn job_is_noop_off_policy_day() {
        let state = AppState::new();
        hire(&state, CompanyId::new(), "N", Nationality::Saudi, date(2024, 8, 1)).await;

        let resp = run_progression_job(&state, date(2026, 6, 30)).await.unwrap();
        assert!(!resp.executed);
        assert!(resp.result.is_none());
        assert_eq!(resp.policy, "--07-01");
        assert!(state.progression_events.is_empty());
    }

    #[tokio::test]
    async fn job_runs_on_configured_day() {
        let mut state = AppState::new();
        state.config.progression = ProgressionPolicy::new(7, 1).unwrap();
        hire(&state, CompanyId::new(), "N", Nationality::Saudi, date(2024, 8, 1)).await;

        let resp = run_progression_job(&state, date(2027, 7, 1)).await.unwrap();
        assert!(resp.executed);
        assert_eq!(resp.result.unwrap().updated_count, 1);

        let again = run_progression_job(&state, date(2027, 7, 1)).await.unwrap();
        let again = again.result.unwrap();
        assert_eq!(again.updated_count, 0);
        assert_eq!(again.skipped_employee_ids.len(), 1);
        assert_eq!(state.progression_events.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_rate_row_is_invalid_argument() {
        let state = AppState::new();
        let rates = RatePair::new(
            RatePercent::from_bps_clamped(1225),
            RatePercent::from_bps_clamped(1425),
        );
        let entry = RateHistoryEntry::new(SystemType::New, Nationality::Saudi, rates, date(2029, 7, 1));
        append_rate_history(&state, &caller(), entry.clone()).await.unwrap();

        let again = RateHistoryEntry::new(SystemType::New, Nationality::Saudi, rates, date(2029, 7, 1));
        let err = append_rate_history(&state, &caller(), again).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert_eq!(list_rate_history(&state, Some(SystemType::New), Some(Nationality::Saudi)).len(), 6);
    }

    #[tokio::test]
    async fn classification_requires_roster_entry() {
        let state = AppState::new();
        let err = classify_employee(&state, EmployeeId::new(), date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let reg = hire(&state, CompanyId::new(), "N", Nationality::NonSaudi, date(2025, 2, 1)).await;
        let c = classify_employee(&state, reg.employee.id, date(2025, 3, 1)).unwrap();
        assert_eq!(c.config.gosi_system_type, SystemType::New);
        assert_eq!(c.current_rates.rates.employee_rate, RatePercent::ZERO);
    }
}
