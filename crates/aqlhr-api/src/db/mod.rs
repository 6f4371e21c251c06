//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx. The layer is optional: when
//! `DATABASE_URL` is set, every store is hydrated on startup and every
//! mutation is written through; when absent, the service runs in memory.
//!
//! | Module | Tables |
//! |--------|--------|
//! | [`gosi`] | `gosi_rate_history`, `employees`, `employee_gosi_config` |
//! | [`events`] | `gosi_domain_events` |
//! | [`kpi`] | `module_categories`, `modules`, `module_kpis`, `kpi_measurements` |
//! | [`audit`] | `audit_events` |

pub mod audit;
pub mod events;
pub mod gosi;
pub mod kpi;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect and run the embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set; running in-memory only. State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Wrap a row that cannot be turned back into a domain record.
pub(crate) fn decode_error(table: &str, detail: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("{table}: {detail}").into())
}
