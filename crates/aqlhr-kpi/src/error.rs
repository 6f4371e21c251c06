//! KPI pipeline errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KpiError {
    /// No active KPI with this name in the company's module.
    #[error("KPI not found: \"{kpi_name}\" in module \"{module_name}\"")]
    KpiNotFound {
        module_name: String,
        kpi_name: String,
    },

    #[error("module not found: \"{0}\"")]
    ModuleNotFound(String),

    /// A KPI definition failed validation.
    #[error("invalid KPI definition: {0}")]
    InvalidDefinition(String),

    /// Two definitions in one registration share a `kpi_order`.
    #[error("duplicate kpi_order {0} in registration")]
    DuplicateKpiOrder(i32),

    /// Two KPIs of one module would share a name.
    #[error("duplicate kpi_name \"{0}\" in module")]
    DuplicateKpiName(String),

    /// A measured value is NaN or infinite.
    #[error("invalid measurement value: {0}")]
    InvalidValue(String),
}
