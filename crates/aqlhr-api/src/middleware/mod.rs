//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and domain gauges.
//!
//! Authentication lives in [`crate::auth`]; tracing and CORS are
//! `tower-http` layers applied in [`crate::app`].

pub mod metrics;
