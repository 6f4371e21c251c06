//! # API Route Modules
//!
//! - `gosi`: GOSI contribution engine: calculation, company preview, rate
//!   progression, employee classification, roster and rate schedule.
//! - `kpi`: KPI scoring pipeline: module/KPI registration, measurements,
//!   feed sync, and performance scores.
//!
//! Every handler here sits behind `auth_middleware` and takes a
//! [`CallerIdentity`](crate::auth::CallerIdentity).

pub mod gosi;
pub mod kpi;
