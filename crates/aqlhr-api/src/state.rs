//! # Application State
//!
//! Shared state for the Axum application, passed to handlers via `State`.
//!
//! - **GOSI**: roster, per-employee configs, the rate schedule, and the
//!   progression events emitted by rate updates
//! - **KPI**: categories, modules, KPIs, and the measurement log
//! - **Audit**: the hash-chained audit trail
//!
//! Stores are in memory. When a pool is configured every mutation is
//! written through to Postgres and [`AppState::hydrate_from_db`] reloads
//! them on startup.

use std::collections::HashMap;
use std::sync::Arc;

use aqlhr_auth_client::AuthClient;
use aqlhr_gosi::{
    Employee, EmployeeGosiConfig, ProgressionPolicy, RateProgressionEvent, RateSchedule,
};
use aqlhr_kpi::{KpiMeasurement, MeasurementFeed, Module, ModuleCategory, ModuleKpi, StaticFeed};
use parking_lot::RwLock;
use sqlx::PgPool;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::audit::AuditLog;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await`.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Clone out the records matching `pred` without copying the rest.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// First record matching `pred`, if any.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Read-validate-update a record under a single write lock.
    ///
    /// Returns `None` if the record doesn't exist, or `Some` with the
    /// closure's result.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Application State --------------------------------------------------------

/// Application configuration.
///
/// `Debug` redacts the service token.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Static service bearer token. Auth is disabled when this is `None`
    /// and no auth service is configured.
    pub auth_token: Option<Zeroizing<String>>,
    /// Calendar day on which the rate-progression job runs.
    pub progression: ProgressionPolicy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("progression", &self.progression)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            progression: ProgressionPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    // -- GOSI --
    pub employees: Store<Employee>,
    /// Keyed by employee id.
    pub gosi_configs: Store<EmployeeGosiConfig>,
    pub rate_schedule: Arc<RwLock<RateSchedule>>,
    pub progression_events: Store<RateProgressionEvent>,
    /// Serializes progression runs so a manual update and the scheduled job
    /// never interleave.
    pub progression_lock: Arc<tokio::sync::Mutex<()>>,

    // -- KPI --
    pub categories: Store<ModuleCategory>,
    pub modules: Store<Module>,
    pub kpis: Store<ModuleKpi>,
    pub measurements: Store<KpiMeasurement>,
    /// Held across the lookup-or-create section of KPI registration.
    pub registry_lock: Arc<tokio::sync::Mutex<()>>,
    pub feed: Arc<dyn MeasurementFeed>,

    pub audit_log: AuditLog,

    /// When `Some`, mutations are also written to Postgres.
    pub db_pool: Option<PgPool>,
    /// Resolves bearer tokens to users when configured.
    pub auth_client: Option<AuthClient>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("employees", &self.employees.len())
            .field("kpis", &self.kpis.len())
            .field("audit_log", &self.audit_log.len())
            .field("db_pool", &self.db_pool.is_some())
            .field("auth_client", &self.auth_client.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    /// In-memory state with default configuration and the default schedule.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None, None)
    }

    pub fn with_config(
        config: AppConfig,
        auth_client: Option<AuthClient>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            employees: Store::new(),
            gosi_configs: Store::new(),
            rate_schedule: Arc::new(RwLock::new(RateSchedule::default_schedule())),
            progression_events: Store::new(),
            progression_lock: Arc::new(tokio::sync::Mutex::new(())),
            categories: Store::new(),
            modules: Store::new(),
            kpis: Store::new(),
            measurements: Store::new(),
            registry_lock: Arc::new(tokio::sync::Mutex::new(())),
            feed: Arc::new(StaticFeed::default()),
            audit_log: AuditLog::new(),
            db_pool,
            auth_client,
            config,
        }
    }

    /// Replace the sync feed.
    pub fn with_feed(mut self, feed: Arc<dyn MeasurementFeed>) -> Self {
        self.feed = feed;
        self
    }

    /// Load every persisted table into the in-memory stores.
    ///
    /// Called once on startup when a pool is available. The rate schedule
    /// is replaced by the `gosi_rate_history` table, which the migrations
    /// seed.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let schedule = crate::db::gosi::load_rate_schedule(pool)
            .await
            .map_err(|e| format!("failed to load rate history: {e}"))?;
        let rate_count = schedule.len();
        *self.rate_schedule.write() = schedule;

        let employees = crate::db::gosi::load_employees(pool)
            .await
            .map_err(|e| format!("failed to load employees: {e}"))?;
        let employee_count = employees.len();
        for e in employees {
            self.employees.insert(*e.id.as_uuid(), e);
        }

        let configs = crate::db::gosi::load_configs(pool)
            .await
            .map_err(|e| format!("failed to load GOSI configs: {e}"))?;
        for c in configs {
            self.gosi_configs.insert(*c.employee_id.as_uuid(), c);
        }

        let events = crate::db::events::load_all(pool)
            .await
            .map_err(|e| format!("failed to load progression events: {e}"))?;
        for ev in events {
            self.progression_events.insert(ev.id, ev);
        }

        let categories = crate::db::kpi::load_categories(pool)
            .await
            .map_err(|e| format!("failed to load module categories: {e}"))?;
        for c in categories {
            self.categories.insert(c.id, c);
        }

        let modules = crate::db::kpi::load_modules(pool)
            .await
            .map_err(|e| format!("failed to load modules: {e}"))?;
        let module_count = modules.len();
        for m in modules {
            self.modules.insert(*m.id.as_uuid(), m);
        }

        let kpis = crate::db::kpi::load_kpis(pool)
            .await
            .map_err(|e| format!("failed to load KPIs: {e}"))?;
        let kpi_count = kpis.len();
        for k in kpis {
            self.kpis.insert(*k.id.as_uuid(), k);
        }

        let measurements = crate::db::kpi::load_measurements(pool)
            .await
            .map_err(|e| format!("failed to load KPI measurements: {e}"))?;
        let measurement_count = measurements.len();
        for m in measurements {
            self.measurements.insert(m.id, m);
        }

        let audit = crate::db::audit::load_all(pool)
            .await
            .map_err(|e| format!("failed to load audit events: {e}"))?;
        let audit_count = audit.len();
        self.audit_log.restore(audit);

        tracing::info!(
            rate_history = rate_count,
            employees = employee_count,
            modules = module_count,
            kpis = kpi_count,
            measurements = measurement_count,
            audit_events = audit_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
