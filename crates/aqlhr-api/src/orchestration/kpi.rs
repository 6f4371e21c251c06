//! KPI pipeline orchestration: registration, measurement, sync, and scoring.
//!
//! Registration holds `registry_lock` across its lookup-or-create section so
//! concurrent registrations of one module never create duplicates. The
//! `current_value` compare-and-set runs inside one `Store::try_update`.

use aqlhr_core::ModuleId;
use aqlhr_kpi::measurement::check_value;
use aqlhr_kpi::types::{check_name_conflicts, validate_definitions};
use aqlhr_kpi::{
    reconcile_current_value, score_module, BatchCounts, KpiDefinition, KpiError, KpiMeasurement,
    Module, ModuleCategory, ModuleKpi, ModulePerformance, RegistrationResult, SyncResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::persist_error;
use crate::error::AppError;
use crate::extractors::require_non_blank;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Inputs and results
// ---------------------------------------------------------------------------

/// One module's KPI registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleRegistration {
    pub module_name: String,
    pub category: String,
    #[serde(default)]
    pub module_name_ar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub kpis: Vec<KpiDefinition>,
}

impl ModuleRegistration {
    fn check(&self) -> Result<(), AppError> {
        require_non_blank("module_name", &self.module_name).map_err(AppError::InvalidArgument)?;
        require_non_blank("category", &self.category).map_err(AppError::InvalidArgument)?;
        validate_definitions(&self.kpis)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisteredModule {
    #[schema(value_type = String)]
    pub module_id: ModuleId,
    pub module_name: String,
    pub registered_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkRegisterResponse {
    pub company_id: String,
    pub success_count: usize,
    pub failure_count: usize,
    /// `{"status": "ok" | "error", ...}` per module.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<RegistrationResult>,
}

/// A measurement addressed by names rather than ids.
#[derive(Debug, Clone)]
pub struct MeasurementInput {
    pub company_id: String,
    pub module_name: String,
    pub kpi_name: String,
    pub value: f64,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub measured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordedMeasurement {
    #[schema(value_type = Object)]
    pub measurement: KpiMeasurement,
    /// Whether this measurement became the KPI's current value.
    pub current_value_updated: bool,
    /// The KPI's current value after reconciliation.
    pub current_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncResponse {
    pub company_id: String,
    pub source: String,
    pub success_count: usize,
    pub failure_count: usize,
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<SyncResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PerformanceScores {
    pub company_id: String,
    #[schema(value_type = Vec<Object>)]
    pub performance_scores: Vec<ModulePerformance>,
}

/// A module with its KPIs and latest scores.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleDetail {
    #[schema(value_type = Object)]
    pub module: Module,
    pub category: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub kpis: Vec<ModuleKpi>,
    #[schema(value_type = Object)]
    pub performance: ModulePerformance,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModulePerformanceResponse {
    pub company_id: String,
    pub modules: Vec<ModuleDetail>,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Upsert a module and its KPIs for `company_id`.
///
/// The category is looked up by name and created if missing. KPIs are keyed
/// by `(module_id, kpi_order)`: an existing order is overwritten in place,
/// keeping its id and measurements.
pub async fn register_module_kpis(
    state: &AppState,
    company_id: &str,
    registration: ModuleRegistration,
) -> Result<RegisteredModule, AppError> {
    require_non_blank("company_id", company_id).map_err(AppError::InvalidArgument)?;
    registration.check()?;

    let _registry = state.registry_lock.lock().await;
    let now = Utc::now();

    let found = state
        .modules
        .find(|m| m.is_scoped_to(&registration.module_name, company_id));
    let existing = match &found {
        Some(module) => state.kpis.filter(|k| k.module_id == module.id),
        None => Vec::new(),
    };
    check_name_conflicts(&existing, &registration.kpis)?;

    let category_name = registration.category.trim().to_string();
    let category = match state.categories.find(|c| c.name == category_name) {
        Some(category) => category,
        None => {
            let created = ModuleCategory::new(&category_name, now);
            if let Some(pool) = &state.db_pool {
                crate::db::kpi::insert_category(pool, &created)
                    .await
                    .map_err(|e| persist_error("module category", e))?;
            }
            state.categories.insert(created.id, created.clone());
            tracing::info!(category = %created.name, "module category created");
            created
        }
    };

    let mut module =
        found.unwrap_or_else(|| Module::new(&registration.module_name, category.id, company_id, now));
    module.category_id = category.id;
    if registration.module_name_ar.is_some() {
        module.name_ar = registration.module_name_ar.clone();
    }
    if registration.description.is_some() {
        module.description = registration.description.clone();
    }
    module.is_active = true;
    module.updated_at = now;

    if let Some(pool) = &state.db_pool {
        crate::db::kpi::upsert_module(pool, &module)
            .await
            .map_err(|e| persist_error("module", e))?;
    }
    state.modules.insert(*module.id.as_uuid(), module.clone());

    for def in &registration.kpis {
        match existing.iter().find(|k| k.kpi_order == def.kpi_order) {
            Some(current) => {
                // Edited in place: current_value belongs to record_measurement.
                let mut kpi = current.clone();
                kpi.apply_definition(def, now);
                if let Some(pool) = &state.db_pool {
                    crate::db::kpi::upsert_kpi(pool, &kpi)
                        .await
                        .map_err(|e| persist_error("KPI", e))?;
                }
                state
                    .kpis
                    .update(kpi.id.as_uuid(), |k| k.apply_definition(def, now));
            }
            None => {
                let kpi = ModuleKpi::from_definition(module.id, def, now);
                if let Some(pool) = &state.db_pool {
                    crate::db::kpi::upsert_kpi(pool, &kpi)
                        .await
                        .map_err(|e| persist_error("KPI", e))?;
                }
                state.kpis.insert(*kpi.id.as_uuid(), kpi);
            }
        }
    }

    tracing::info!(
        module = %module.name,
        company_id = %company_id,
        kpis = registration.kpis.len(),
        "module KPIs registered"
    );

    Ok(RegisteredModule {
        module_id: module.id,
        module_name: module.name,
        registered_count: registration.kpis.len(),
    })
}

/// Register each module independently and report per-module results.
pub async fn bulk_register(
    state: &AppState,
    company_id: &str,
    modules: Vec<ModuleRegistration>,
) -> Result<BulkRegisterResponse, AppError> {
    require_non_blank("company_id", company_id).map_err(AppError::InvalidArgument)?;

    let mut results = Vec::with_capacity(modules.len());
    for registration in modules {
        let module_name = registration.module_name.clone();
        let result = match register_module_kpis(state, company_id, registration).await {
            Ok(registered) => RegistrationResult::Ok {
                module_name,
                module_id: registered.module_id,
                registered_count: registered.registered_count,
            },
            Err(e) => {
                tracing::warn!(module = %module_name, error = %e, "bulk registration item failed");
                RegistrationResult::Error {
                    module_name,
                    error: e.body().error,
                }
            }
        };
        results.push(result);
    }

    let counts = BatchCounts::tally(&results, RegistrationResult::is_ok);
    Ok(BulkRegisterResponse {
        company_id: company_id.to_string(),
        success_count: counts.success_count,
        failure_count: counts.failure_count,
        results,
    })
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

fn resolve_kpi(state: &AppState, company_id: &str, module_name: &str, kpi_name: &str) -> Result<ModuleKpi, KpiError> {
    let not_found = || KpiError::KpiNotFound {
        module_name: module_name.trim().to_string(),
        kpi_name: kpi_name.trim().to_string(),
    };
    let module = state
        .modules
        .find(|m| m.is_active && m.is_scoped_to(module_name, company_id))
        .ok_or_else(not_found)?;
    let name = kpi_name.trim();
    state
        .kpis
        .find(|k| k.is_active && k.module_id == module.id && k.kpi_name == name)
        .ok_or_else(not_found)
}

/// Append a measurement and reconcile the KPI's current value.
///
/// Nothing is written when the KPI cannot be resolved.
pub async fn record_measurement(
    state: &AppState,
    input: MeasurementInput,
) -> Result<RecordedMeasurement, AppError> {
    require_non_blank("company_id", &input.company_id).map_err(AppError::InvalidArgument)?;
    require_non_blank("module_name", &input.module_name).map_err(AppError::InvalidArgument)?;
    require_non_blank("kpi_name", &input.kpi_name).map_err(AppError::InvalidArgument)?;
    let value = check_value(input.value)?;

    let kpi = resolve_kpi(state, &input.company_id, &input.module_name, &input.kpi_name)?;

    let now = Utc::now();
    let measurement = KpiMeasurement {
        id: Uuid::new_v4(),
        kpi_id: kpi.id,
        measured_value: value,
        measured_at: input.measured_at.unwrap_or(now),
        measurement_source: input.source,
        notes: input.notes,
        recorded_at: now,
    };

    if let Some(pool) = &state.db_pool {
        crate::db::kpi::insert_measurement(pool, &measurement)
            .await
            .map_err(|e| persist_error("KPI measurement", e))?;
    }
    state.measurements.insert(measurement.id, measurement.clone());

    let (updated, reconciled) = state
        .kpis
        .try_update(kpi.id.as_uuid(), |k| {
            let updated = reconcile_current_value(k, value, measurement.measured_at);
            Ok::<_, KpiError>((updated, k.clone()))
        })
        .unwrap_or_else(|| Ok((false, kpi.clone())))?;

    if updated {
        if let Some(pool) = &state.db_pool {
            crate::db::kpi::update_current_value(pool, &reconciled)
                .await
                .map_err(|e| persist_error("KPI current value", e))?;
        }
    }

    tracing::info!(
        kpi_id = %kpi.id,
        kpi = %kpi.kpi_name,
        value,
        current_value_updated = updated,
        "KPI measurement recorded"
    );

    Ok(RecordedMeasurement {
        measurement,
        current_value_updated: updated,
        current_value: reconciled.current_value,
    })
}

/// Record every sample from the configured feed, one at a time.
pub async fn sync_kpi_data(state: &AppState, company_id: &str) -> Result<SyncResponse, AppError> {
    require_non_blank("company_id", company_id).map_err(AppError::InvalidArgument)?;

    let source = state.feed.source_name().to_string();
    let samples = state.feed.samples(company_id);

    let mut results = Vec::with_capacity(samples.len());
    for sample in samples {
        let input = MeasurementInput {
            company_id: company_id.to_string(),
            module_name: sample.module_name.clone(),
            kpi_name: sample.kpi_name.clone(),
            value: sample.value,
            source: Some(source.clone()),
            notes: None,
            measured_at: None,
        };
        let result = match record_measurement(state, input).await {
            Ok(recorded) => SyncResult::Ok {
                module_name: sample.module_name,
                kpi_name: sample.kpi_name,
                value: sample.value,
                current_value_updated: recorded.current_value_updated,
            },
            Err(e) => SyncResult::Error {
                module_name: sample.module_name,
                kpi_name: sample.kpi_name,
                error: e.body().error,
            },
        };
        results.push(result);
    }

    let counts = BatchCounts::tally(&results, SyncResult::is_ok);
    tracing::info!(
        company_id = %company_id,
        ok = counts.success_count,
        failed = counts.failure_count,
        "KPI sync finished"
    );

    Ok(SyncResponse {
        company_id: company_id.to_string(),
        source,
        success_count: counts.success_count,
        failure_count: counts.failure_count,
        results,
    })
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn company_modules(state: &AppState, company_id: &str) -> Vec<Module> {
    let company_id = company_id.trim();
    let mut modules = state
        .modules
        .filter(|m| m.is_active && m.company_id == company_id);
    modules.sort_by(|a, b| a.name.cmp(&b.name));
    modules
}

fn category_name(state: &AppState, module: &Module) -> Option<String> {
    state.categories.get(&module.category_id).map(|c| c.name)
}

/// Score every active module of `company_id`.
pub fn calculate_scores(state: &AppState, company_id: &str) -> Result<PerformanceScores, AppError> {
    require_non_blank("company_id", company_id).map_err(AppError::InvalidArgument)?;

    let performance_scores = company_modules(state, company_id)
        .iter()
        .map(|module| {
            let kpis = state.kpis.filter(|k| k.module_id == module.id);
            score_module(module, category_name(state, module).as_deref(), &kpis)
        })
        .collect();

    Ok(PerformanceScores {
        company_id: company_id.to_string(),
        performance_scores,
    })
}

/// Modules with their KPIs and scores, optionally narrowed to one module.
pub fn get_module_performance(
    state: &AppState,
    company_id: &str,
    module_name: Option<&str>,
) -> Result<ModulePerformanceResponse, AppError> {
    require_non_blank("company_id", company_id).map_err(AppError::InvalidArgument)?;

    let mut modules = company_modules(state, company_id);
    if let Some(name) = module_name {
        modules.retain(|m| m.is_scoped_to(name, company_id));
        if modules.is_empty() {
            return Err(KpiError::ModuleNotFound(name.trim().to_string()).into());
        }
    }

    let details = modules
        .into_iter()
        .map(|module| {
            let mut kpis = state.kpis.filter(|k| k.module_id == module.id);
            kpis.sort_by_key(|k| k.kpi_order);
            let category = category_name(state, &module);
            let performance = score_module(&module, category.as_deref(), &kpis);
            ModuleDetail {
                module,
                category,
                kpis,
                performance,
            }
        })
        .collect();

    Ok(ModulePerformanceResponse {
        company_id: company_id.to_string(),
        modules: details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqlhr_core::KpiId;
    use aqlhr_kpi::{FeedSample, Grade, ScoreDirection, StaticFeed};
    use chrono::Duration;
    use std::sync::Arc;

    /// Measurements for one KPI, oldest first.
    fn measurements_for(state: &AppState, kpi_id: KpiId) -> Vec<KpiMeasurement> {
        let mut rows = state.measurements.filter(|m| m.kpi_id == kpi_id);
        rows.sort_by_key(|m| (m.measured_at, m.recorded_at));
        rows
    }

    fn def(name: &str, order: i32, target: f64, unit: Option<&str>) -> KpiDefinition {
        KpiDefinition {
            kpi_name: name.into(),
            kpi_name_ar: None,
            kpi_order: order,
            target_value: Some(target),
            unit: unit.map(str::to_string),
            calculation_method: None,
            direction: None,
        }
    }

    fn registration(module: &str, kpis: Vec<KpiDefinition>) -> ModuleRegistration {
        ModuleRegistration {
            module_name: module.into(),
            category: "Core HR".into(),
            module_name_ar: None,
            description: None,
            kpis,
        }
    }

    fn measure(company: &str, module: &str, kpi: &str, value: f64) -> MeasurementInput {
        MeasurementInput {
            company_id: company.into(),
            module_name: module.into(),
            kpi_name: kpi.into(),
            value,
            source: None,
            notes: None,
            measured_at: None,
        }
    }

    #[tokio::test]
    async fn end_to_end_compliance_example() {
        let state = AppState::new();
        register_module_kpis(
            &state,
            "acme",
            registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]),
        )
        .await
        .unwrap();
        record_measurement(&state, measure("acme", "Payroll", "Compliance %", 97.0))
            .await
            .unwrap();

        let scores = calculate_scores(&state, "acme").unwrap();
        let payroll = &scores.performance_scores[0];
        assert_eq!(payroll.kpi_scores[0].score, 97.0);
        assert_eq!(payroll.overall_score, 97.0);
        assert_eq!(payroll.performance_grade, Grade::A);
        assert_eq!(payroll.category.as_deref(), Some("Core HR"));
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let state = AppState::new();
        let first = register_module_kpis(
            &state,
            "acme",
            registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]),
        )
        .await
        .unwrap();
        let second = register_module_kpis(
            &state,
            "acme",
            registration("Payroll", vec![def("Compliance Rate", 1, 95.0, Some("%"))]),
        )
        .await
        .unwrap();

        assert_eq!(first.module_id, second.module_id);
        assert_eq!(state.modules.len(), 1);
        assert_eq!(state.categories.len(), 1);
        let kpis = state.kpis.list();
        assert_eq!(kpis.len(), 1);
        assert_eq!(kpis[0].kpi_name, "Compliance Rate");
        assert_eq!(kpis[0].target_value, Some(95.0));
    }

    #[tokio::test]
    async fn same_module_name_is_scoped_per_company() {
        let state = AppState::new();
        let a = register_module_kpis(&state, "acme", registration("Payroll", vec![]))
            .await
            .unwrap();
        let b = register_module_kpis(&state, "globex", registration("Payroll", vec![]))
            .await
            .unwrap();
        assert_ne!(a.module_id, b.module_id);
    }

    #[tokio::test]
    async fn concurrent_registration_creates_one_module() {
        let state = AppState::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = state.clone();
            handles.push(tokio::spawn(async move {
                register_module_kpis(
                    &s,
                    "acme",
                    registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]),
                )
                .await
                .unwrap()
                .module_id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(state.modules.len(), 1);
        assert_eq!(state.kpis.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_kpi_order_is_rejected() {
        let state = AppState::new();
        let err = register_module_kpis(
            &state,
            "acme",
            registration("Payroll", vec![def("A", 1, 1.0, None), def("B", 1, 1.0, None)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert!(state.modules.is_empty());
    }

    #[tokio::test]
    async fn duplicate_kpi_name_is_rejected() {
        let state = AppState::new();
        let err = register_module_kpis(
            &state,
            "acme",
            registration(
                "Payroll",
                vec![
                    def("Compliance %", 1, 100.0, Some("%")),
                    def("Compliance % ", 2, 90.0, Some("%")),
                ],
            ),
        )
        .await
        .unwrap_err();
        match err {
            AppError::InvalidArgument(msg) => assert!(msg.contains("duplicate kpi_name")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
        assert!(state.modules.is_empty());
        assert!(state.kpis.is_empty());
    }

    #[tokio::test]
    async fn renaming_onto_a_name_at_another_order_is_rejected() {
        let state = AppState::new();
        register_module_kpis(
            &state,
            "acme",
            registration(
                "Payroll",
                vec![def("Compliance %", 1, 100.0, Some("%")), def("Payroll Accuracy", 2, 100.0, None)],
            ),
        )
        .await
        .unwrap();

        let err = register_module_kpis(
            &state,
            "acme",
            registration("Payroll", vec![def("Payroll Accuracy", 1, 100.0, None)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let mut names: Vec<(i32, String)> =
            state.kpis.list().into_iter().map(|k| (k.kpi_order, k.kpi_name)).collect();
        names.sort();
        assert_eq!(
            names,
            vec![(1, "Compliance %".to_string()), (2, "Payroll Accuracy".to_string())]
        );

        // Every measurement by name lands on the same KPI.
        for _ in 0..10 {
            let recorded = record_measurement(&state, measure("acme", "Payroll", "Payroll Accuracy", 40.0))
                .await
                .unwrap();
            let kpi = state.kpis.get(recorded.measurement.kpi_id.as_uuid()).unwrap();
            assert_eq!(kpi.kpi_order, 2);
        }
    }

    #[tokio::test]
    async fn reregistration_keeps_the_reconciled_value() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();
        let at = Utc::now();
        let mut m = measure("acme", "Payroll", "Compliance %", 97.0);
        m.measured_at = Some(at);
        record_measurement(&state, m).await.unwrap();

        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 95.0, Some("%"))]))
            .await
            .unwrap();

        let kpi = state.kpis.list().remove(0);
        assert_eq!(kpi.target_value, Some(95.0));
        assert_eq!(kpi.current_value, Some(97.0));
        assert_eq!(kpi.current_value_at, Some(at));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reregistration_racing_measurements_keeps_the_newest() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();
        let base = Utc::now();

        let registrar = {
            let s = state.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let target = 100.0 + f64::from(i % 2);
                    register_module_kpis(&s, "acme", registration("Payroll", vec![def("Compliance %", 1, target, Some("%"))]))
                        .await
                        .unwrap();
                }
            })
        };
        let recorder = {
            let s = state.clone();
            tokio::spawn(async move {
                for i in 1..=200 {
                    let mut m = measure("acme", "Payroll", "Compliance %", f64::from(i));
                    m.measured_at = Some(base + Duration::seconds(i64::from(i)));
                    record_measurement(&s, m).await.unwrap();
                }
            })
        };
        registrar.await.unwrap();
        recorder.await.unwrap();

        let kpi = state.kpis.list().remove(0);
        assert_eq!(kpi.current_value, Some(200.0));
        assert_eq!(kpi.current_value_at, Some(base + Duration::seconds(200)));
    }

    #[tokio::test]
    async fn unknown_kpi_writes_no_measurement() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();

        let err = record_measurement(&state, measure("acme", "Payroll", "Nope", 1.0))
            .await
            .unwrap_err();
        match err {
            AppError::NotFound(msg) => assert!(msg.starts_with("KPI not found")),
            other => panic!("expected NotFound, got {other:?}"),
        }
        let err = record_measurement(&state, measure("globex", "Payroll", "Compliance %", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.measurements.is_empty());
    }

    #[tokio::test]
    async fn late_measurement_is_logged_but_does_not_regress() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();

        let t1 = Utc::now();
        let mut newer = measure("acme", "Payroll", "Compliance %", 97.0);
        newer.measured_at = Some(t1);
        assert!(record_measurement(&state, newer).await.unwrap().current_value_updated);

        let mut older = measure("acme", "Payroll", "Compliance %", 50.0);
        older.measured_at = Some(t1 - Duration::days(1));
        let recorded = record_measurement(&state, older).await.unwrap();
        assert!(!recorded.current_value_updated);
        assert_eq!(recorded.current_value, Some(97.0));

        let kpi = state.kpis.list().remove(0);
        assert_eq!(kpi.current_value, Some(97.0));
        let history = measurements_for(&state, kpi.id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].measured_value, 50.0);
    }

    #[tokio::test]
    async fn bulk_register_reports_partial_failure() {
        let state = AppState::new();
        let resp = bulk_register(
            &state,
            "acme",
            vec![
                registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]),
                registration("  ", vec![]),
                registration("Attendance", vec![def("Attendance Accuracy", 1, 100.0, None)]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(resp.success_count, 2);
        assert_eq!(resp.failure_count, 1);
        assert!(matches!(&resp.results[1], RegistrationResult::Error { error, .. } if error.contains("module_name")));
    }

    #[tokio::test]
    async fn sync_collects_failures_without_aborting() {
        let feed = StaticFeed::new(vec![
            FeedSample::new("Payroll", "Compliance %", 99.0),
            FeedSample::new("Payroll", "Missing KPI", 1.0),
            FeedSample::new("Ghost", "Anything", 1.0),
        ]);
        let state = AppState::new().with_feed(Arc::new(feed));
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();

        let resp = sync_kpi_data(&state, "acme").await.unwrap();
        assert_eq!(resp.success_count, 1);
        assert_eq!(resp.failure_count, 2);
        assert_eq!(resp.source, "kpi_sync");
        assert_eq!(state.measurements.len(), 1);
        assert_eq!(
            state.measurements.list()[0].measurement_source.as_deref(),
            Some("kpi_sync")
        );
    }

    #[tokio::test]
    async fn explicit_direction_overrides_name_heuristic() {
        let state = AppState::new();
        let mut lower = def("Turnover", 1, 10.0, None);
        lower.direction = Some(ScoreDirection::LowerIsBetter);
        register_module_kpis(&state, "acme", registration("Retention", vec![lower]))
            .await
            .unwrap();
        record_measurement(&state, measure("acme", "Retention", "Turnover", 2.0))
            .await
            .unwrap();

        let scores = calculate_scores(&state, "acme").unwrap();
        assert_eq!(scores.performance_scores[0].kpi_scores[0].score, 80.0);
    }

    #[tokio::test]
    async fn module_without_scorable_kpis_scores_zero() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 0.0, Some("%"))]))
            .await
            .unwrap();
        record_measurement(&state, measure("acme", "Payroll", "Compliance %", 50.0))
            .await
            .unwrap();

        let scores = calculate_scores(&state, "acme").unwrap();
        assert_eq!(scores.performance_scores[0].overall_score, 0.0);
        assert_eq!(scores.performance_scores[0].performance_grade, Grade::F);
    }

    #[tokio::test]
    async fn module_performance_filters_and_reports_missing() {
        let state = AppState::new();
        register_module_kpis(&state, "acme", registration("Payroll", vec![def("Compliance %", 1, 100.0, Some("%"))]))
            .await
            .unwrap();
        register_module_kpis(&state, "acme", registration("Attendance", vec![]))
            .await
            .unwrap();

        let all = get_module_performance(&state, "acme", None).unwrap();
        assert_eq!(all.modules.len(), 2);
        assert_eq!(all.modules[0].module.name, "Attendance");

        let one = get_module_performance(&state, "acme", Some("Payroll")).unwrap();
        assert_eq!(one.modules.len(), 1);
        assert_eq!(one.modules[0].kpis.len(), 1);

        let err = get_module_performance(&state, "acme", Some("Recruitment")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
