//! The `current_value` reconciliation rule.
//!
//! A KPI's cached `current_value` is the value of the measurement with the
//! greatest `measured_at`. Measurements may arrive out of order; an older
//! one is kept in the log but never regresses the cache. Ties go to the
//! later write.

use chrono::{DateTime, Utc};

use crate::error::KpiError;
use crate::types::ModuleKpi;

/// Reject NaN and infinite measurement values.
pub fn check_value(value: f64) -> Result<f64, KpiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(KpiError::InvalidValue(format!("{value} is not a finite number")))
    }
}

/// Apply a measurement to the KPI's cached value.
///
/// Returns `true` when `current_value` was overwritten. Callers must hold
/// the KPI store's write lock across this call so the compare and the set
/// are one step.
pub fn reconcile_current_value(kpi: &mut ModuleKpi, value: f64, measured_at: DateTime<Utc>) -> bool {
    let newer = kpi.current_value_at.map_or(true, |at| measured_at >= at);
    if newer {
        kpi.current_value = Some(value);
        kpi.current_value_at = Some(measured_at);
        kpi.updated_at = Utc::now();
    }
    newer
}
