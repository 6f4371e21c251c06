//! Rate progression domain events (`gosi_domain_events`).
//!
//! Events are immutable. The full event is kept in `payload`; the indexed
//! columns duplicate the fields used for lookups.

use aqlhr_gosi::RateProgressionEvent;
use sqlx::{PgExecutor, PgPool};

use super::decode_error;

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    event: &RateProgressionEvent,
) -> Result<(), sqlx::Error> {
    let payload =
        serde_json::to_value(event).map_err(|e| decode_error("gosi_domain_events", e))?;

    sqlx::query(
        "INSERT INTO gosi_domain_events (id, event_type, employee_id, effective_from, payload, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(event.id)
    .bind(&event.event_type)
    .bind(event.employee_id.as_uuid())
    .bind(event.effective_from)
    .bind(payload)
    .bind(event.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<RateProgressionEvent>, sqlx::Error> {
    let payloads: Vec<serde_json::Value> =
        sqlx::query_scalar("SELECT payload FROM gosi_domain_events ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    payloads
        .into_iter()
        .map(|p| serde_json::from_value(p).map_err(|e| decode_error("gosi_domain_events", e)))
        .collect()
}
