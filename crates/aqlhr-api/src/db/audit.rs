//! Audit event persistence.
//!
//! The hash chain is computed in memory by [`crate::audit::AuditLog`]; this
//! module stores the finished records and reloads them in chain order.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditRecord;

pub async fn insert(pool: &PgPool, record: &AuditRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, event_type, actor_id, resource_type, resource_id,
         action, metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(record.id)
    .bind(&record.event_type)
    .bind(&record.actor_id)
    .bind(&record.resource_type)
    .bind(record.resource_id)
    .bind(&record.action)
    .bind(&record.metadata)
    .bind(&record.previous_hash)
    .bind(&record.event_hash)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, event_type, actor_id, resource_type, resource_id,
         action, metadata, previous_hash, event_hash, created_at
         FROM audit_events ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AuditEventRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    event_type: String,
    actor_id: Option<String>,
    resource_type: String,
    resource_id: Uuid,
    action: String,
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_record(self) -> AuditRecord {
        AuditRecord {
            id: self.id,
            event_type: self.event_type,
            actor_id: self.actor_id,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            action: self.action,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: self.created_at,
        }
    }
}
