//! # KPI Registry Records
//!
//! `ModuleCategory` → `Module` → `ModuleKpi` → `KpiMeasurement`.
//!
//! Modules are scoped by `(name, company_id)`; KPIs by
//! `(module_id, kpi_order)`. Measurements are append-only.
//!
//! `company_id` is an opaque tenant key here, not a UUID: dashboards scope
//! KPI data by whatever tenant identifier the session carries.

use std::collections::HashSet;

use aqlhr_core::{KpiId, ModuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KpiError;
use crate::scoring::ScoreDirection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCategory {
    pub id: Uuid,
    pub name: String,
    pub name_ar: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ModuleCategory {
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            name_ar: None,
            description: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub name_ar: Option<String>,
    pub category_id: Uuid,
    pub company_id: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn new(name: &str, category_id: Uuid, company_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: ModuleId::new(),
            name: name.trim().to_string(),
            name_ar: None,
            category_id,
            company_id: company_id.trim().to_string(),
            description: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this module is the one addressed by `(name, company_id)`.
    pub fn is_scoped_to(&self, name: &str, company_id: &str) -> bool {
        self.name == name.trim() && self.company_id == company_id.trim()
    }
}

/// A KPI as supplied by a registration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub kpi_name: String,
    #[serde(default)]
    pub kpi_name_ar: Option<String>,
    pub kpi_order: i32,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub calculation_method: Option<String>,
    /// Explicit scoring direction. When absent, the direction is inferred
    /// from the name and unit.
    #[serde(default)]
    pub direction: Option<ScoreDirection>,
}

impl KpiDefinition {
    pub fn validate(&self) -> Result<(), KpiError> {
        if self.kpi_name.trim().is_empty() {
            return Err(KpiError::InvalidDefinition("kpi_name must not be empty".into()));
        }
        if self.kpi_order < 0 {
            return Err(KpiError::InvalidDefinition(format!(
                "kpi_order must be non-negative, got {}",
                self.kpi_order
            )));
        }
        if let Some(target) = self.target_value {
            if !target.is_finite() {
                return Err(KpiError::InvalidDefinition(format!(
                    "target_value for \"{}\" must be a finite number",
                    self.kpi_name
                )));
            }
        }
        Ok(())
    }
}

/// Validate a full registration batch: each definition, plus unique orders
/// and unique trimmed names.
pub fn validate_definitions(defs: &[KpiDefinition]) -> Result<(), KpiError> {
    let mut orders = HashSet::new();
    let mut names = HashSet::new();
    for def in defs {
        def.validate()?;
        if !orders.insert(def.kpi_order) {
            return Err(KpiError::DuplicateKpiOrder(def.kpi_order));
        }
        let name = def.kpi_name.trim();
        if !names.insert(name) {
            return Err(KpiError::DuplicateKpiName(name.to_string()));
        }
    }
    Ok(())
}

/// Check that registering `defs` over a module's `existing` KPIs leaves
/// every active name unique.
///
/// Orders present in `defs` take the new name; the other active KPIs keep
/// theirs.
pub fn check_name_conflicts(existing: &[ModuleKpi], defs: &[KpiDefinition]) -> Result<(), KpiError> {
    let redefined: HashSet<i32> = defs.iter().map(|d| d.kpi_order).collect();
    let mut names: HashSet<&str> = defs.iter().map(|d| d.kpi_name.trim()).collect();
    for kpi in existing
        .iter()
        .filter(|k| k.is_active && !redefined.contains(&k.kpi_order))
    {
        if !names.insert(kpi.kpi_name.as_str()) {
            return Err(KpiError::DuplicateKpiName(kpi.kpi_name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleKpi {
    pub id: KpiId,
    pub module_id: ModuleId,
    pub kpi_name: String,
    pub kpi_name_ar: Option<String>,
    pub kpi_order: i32,
    pub target_value: Option<f64>,
    /// Value of the latest measurement by `current_value_at`.
    pub current_value: Option<f64>,
    pub current_value_at: Option<DateTime<Utc>>,
    pub unit: Option<String>,
    pub calculation_method: Option<String>,
    pub direction: Option<ScoreDirection>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl ModuleKpi {
    pub fn from_definition(module_id: ModuleId, def: &KpiDefinition, now: DateTime<Utc>) -> Self {
        Self {
            id: KpiId::new(),
            module_id,
            kpi_name: def.kpi_name.trim().to_string(),
            kpi_name_ar: def.kpi_name_ar.clone(),
            kpi_order: def.kpi_order,
            target_value: def.target_value,
            current_value: None,
            current_value_at: None,
            unit: def.unit.clone(),
            calculation_method: def.calculation_method.clone(),
            direction: def.direction,
            is_active: true,
            updated_at: now,
        }
    }

    /// Overwrite the definition fields, keeping identity and measurements.
    pub fn apply_definition(&mut self, def: &KpiDefinition, now: DateTime<Utc>) {
        self.kpi_name = def.kpi_name.trim().to_string();
        self.kpi_name_ar = def.kpi_name_ar.clone();
        self.target_value = def.target_value;
        self.unit = def.unit.clone();
        self.calculation_method = def.calculation_method.clone();
        self.direction = def.direction;
        self.is_active = true;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMeasurement {
    pub id: Uuid,
    pub kpi_id: KpiId,
    pub measured_value: f64,
    /// When the value was observed.
    pub measured_at: DateTime<Utc>,
    pub measurement_source: Option<String>,
    pub notes: Option<String>,
    /// When the row was written.
    pub recorded_at: DateTime<Utc>,
}
