//! # Audit Trail
//!
//! Append-only, hash-chained log of auditable actions. Each record's hash is
//! `SHA-256(previous_hash || event_type || resource_type || resource_id || action)`,
//! starting from 64 zeros, so any edit or deletion breaks every later link.
//!
//! The chain is built in memory under one write lock and written through to
//! `audit_events` by the caller when a database is configured.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An auditable action, before it is chained.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    /// User id of the caller, when known.
    pub actor_id: Option<String>,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub event_type: String,
    pub actor_id: Option<String>,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<RwLock<Vec<AuditRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain `event` onto the log and return the stored record.
    pub fn append(&self, event: AuditEvent) -> AuditRecord {
        let mut entries = self.entries.write();
        let previous_hash = entries
            .last()
            .map(|r| r.event_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let event_hash = chain_hash(
            &previous_hash,
            &event.event_type,
            &event.resource_type,
            event.resource_id,
            &event.action,
        );
        let record = AuditRecord {
            id: Uuid::new_v4(),
            event_type: event.event_type,
            actor_id: event.actor_id,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            action: event.action,
            metadata: event.metadata,
            previous_hash,
            event_hash,
            created_at: Utc::now(),
        };
        entries.push(record.clone());
        record
    }

    /// Replace the log with persisted records, oldest first.
    pub fn restore(&self, records: Vec<AuditRecord>) {
        *self.entries.write() = records;
    }

    pub fn list(&self) -> Vec<AuditRecord> {
        self.entries.read().clone()
    }

    pub fn for_resource(&self, resource_type: &str, resource_id: Uuid) -> Vec<AuditRecord> {
        self.entries
            .read()
            .iter()
            .filter(|r| r.resource_type == resource_type && r.resource_id == resource_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute every link. Returns the number of broken links.
    pub fn broken_links(&self) -> usize {
        let entries = self.entries.read();
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut broken = 0;
        for r in entries.iter() {
            let recomputed = chain_hash(
                &r.previous_hash,
                &r.event_type,
                &r.resource_type,
                r.resource_id,
                &r.action,
            );
            if r.previous_hash != expected_prev || r.event_hash != recomputed {
                broken += 1;
            }
            expected_prev = r.event_hash.clone();
        }
        broken
    }
}

fn chain_hash(
    previous_hash: &str,
    event_type: &str,
    resource_type: &str,
    resource_id: Uuid,
    action: &str,
) -> String {
    sha256_hex(&format!(
        "{previous_hash}{event_type}{resource_type}{resource_id}{action}"
    ))
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}
