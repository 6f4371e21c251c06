//! # Engine Orchestration
//!
//! The glue between HTTP handlers and the pure domain crates. Each function
//! reads the in-memory stores, calls into `aqlhr-gosi` or `aqlhr-kpi`,
//! writes through to Postgres when a pool is configured, and records audit
//! events.
//!
//! Handlers stay thin: they extract and validate, then call in here. The
//! integration tests drive these functions through the router.

pub mod gosi;
pub mod kpi;

use crate::audit::{AuditEvent, AuditRecord};
use crate::error::AppError;
use crate::state::AppState;

/// Chain an audit event and write it through.
pub(crate) async fn record_audit(
    state: &AppState,
    event: AuditEvent,
) -> Result<AuditRecord, AppError> {
    let record = state.audit_log.append(event);
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::audit::insert(pool, &record).await {
            tracing::error!(
                audit_id = %record.id,
                error = %e,
                "failed to persist audit event"
            );
            return Err(AppError::Internal(format!("audit persistence failed: {e}")));
        }
    }
    Ok(record)
}

/// Map a write-through failure to a 500, logging what was being written.
pub(crate) fn persist_error(what: &str, err: sqlx::Error) -> AppError {
    tracing::error!(error = %err, "failed to persist {what}");
    AppError::Internal(format!("{what} persistence failed: {err}"))
}
