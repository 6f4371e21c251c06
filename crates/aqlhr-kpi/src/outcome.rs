//! Per-item results for batch operations.
//!
//! `bulk-register` and `sync-kpi-data` never abort on the first failure.
//! Each item reports `{"status": "ok", ...}` or `{"status": "error", ...}`
//! and the response carries the counts.

use aqlhr_core::ModuleId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationResult {
    Ok {
        module_name: String,
        module_id: ModuleId,
        registered_count: usize,
    },
    Error {
        module_name: String,
        error: String,
    },
}

impl RegistrationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResult {
    Ok {
        module_name: String,
        kpi_name: String,
        value: f64,
        current_value_updated: bool,
    },
    Error {
        module_name: String,
        kpi_name: String,
        error: String,
    },
}

impl SyncResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchCounts {
    pub fn tally<T>(items: &[T], is_ok: impl Fn(&T) -> bool) -> Self {
        let success_count = items.iter().filter(|i| is_ok(i)).count();
        Self {
            success_count,
            failure_count: items.len() - success_count,
        }
    }
}
