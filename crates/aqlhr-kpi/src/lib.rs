//! # aqlhr-kpi: KPI Scoring Pipeline
//!
//! Domain types and pure functions for the KPI registry:
//!
//! - [`types`]: categories, modules, KPI definitions, measurements
//! - [`measurement`]: the `current_value` reconciliation rule
//! - [`scoring`]: score directions, per-KPI scores, module grades
//! - [`feed`]: the measurement feed consumed by `sync-kpi-data`
//! - [`outcome`]: tagged per-item results for fail-soft batch operations
//!
//! Storage and HTTP live in `aqlhr-api`.

pub mod error;
pub mod feed;
pub mod measurement;
pub mod outcome;
pub mod scoring;
pub mod types;

pub use error::KpiError;
pub use feed::{FeedSample, MeasurementFeed, StaticFeed};
pub use measurement::reconcile_current_value;
pub use outcome::{BatchCounts, RegistrationResult, SyncResult};
pub use scoring::{score_kpi, score_module, Grade, KpiScore, ModulePerformance, ScoreDirection};
pub use types::{KpiDefinition, KpiMeasurement, Module, ModuleCategory, ModuleKpi};
