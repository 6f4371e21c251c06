//! GOSI persistence: the rate schedule, the roster, and per-employee
//! configuration.
//!
//! Rate history rows are append-only. Configs are upserted by employee id.

use aqlhr_core::{Amount, CompanyId, EmployeeId, RatePercent};
use aqlhr_gosi::{
    Employee, EmployeeGosiConfig, Nationality, RateHistoryEntry, RateProgressionEvent,
    RateSchedule, SystemType,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::decode_error;

// -- Rate history -------------------------------------------------------------

pub async fn insert_rate(pool: &PgPool, entry: &RateHistoryEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO gosi_rate_history (id, system_type, nationality,
         employee_rate_bps, employer_rate_bps, effective_from)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(entry.id)
    .bind(entry.system_type.as_str())
    .bind(entry.nationality.as_str())
    .bind(bps_to_db(entry.employee_rate))
    .bind(bps_to_db(entry.employer_rate))
    .bind(entry.effective_from)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the full schedule. Duplicate triples cannot exist in the table.
pub async fn load_rate_schedule(pool: &PgPool) -> Result<RateSchedule, sqlx::Error> {
    let rows = sqlx::query_as::<_, RateRow>(
        "SELECT id, system_type, nationality, employee_rate_bps, employer_rate_bps, effective_from
         FROM gosi_rate_history ORDER BY system_type, nationality, effective_from",
    )
    .fetch_all(pool)
    .await?;

    let entries = rows
        .into_iter()
        .map(RateRow::into_entry)
        .collect::<Result<Vec<_>, _>>()?;
    RateSchedule::from_entries(entries).map_err(|e| decode_error("gosi_rate_history", e))
}

#[derive(sqlx::FromRow)]
struct RateRow {
    id: Uuid,
    system_type: String,
    nationality: String,
    employee_rate_bps: i32,
    employer_rate_bps: i32,
    effective_from: NaiveDate,
}

impl RateRow {
    fn into_entry(self) -> Result<RateHistoryEntry, sqlx::Error> {
        const TABLE: &str = "gosi_rate_history";
        Ok(RateHistoryEntry {
            id: self.id,
            system_type: parse_enum::<SystemType>(TABLE, &self.system_type)?,
            nationality: parse_enum::<Nationality>(TABLE, &self.nationality)?,
            employee_rate: bps_from_db(TABLE, self.employee_rate_bps)?,
            employer_rate: bps_from_db(TABLE, self.employer_rate_bps)?,
            effective_from: self.effective_from,
        })
    }
}

// -- Employees ----------------------------------------------------------------

pub async fn insert_employee<'e, E: PgExecutor<'e>>(
    executor: E,
    employee: &Employee,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO employees (id, company_id, full_name, salary_halalas, is_active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(employee.id.as_uuid())
    .bind(employee.company_id.as_uuid())
    .bind(&employee.full_name)
    .bind(employee.salary.halalas())
    .bind(employee.is_active)
    .bind(employee.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn load_employees(pool: &PgPool) -> Result<Vec<Employee>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EmployeeRow>(
        "SELECT id, company_id, full_name, salary_halalas, is_active, created_at
         FROM employees ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(EmployeeRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: Uuid,
    company_id: Uuid,
    full_name: String,
    salary_halalas: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl EmployeeRow {
    fn into_record(self) -> Employee {
        Employee {
            id: EmployeeId::from_uuid(self.id),
            company_id: CompanyId::from_uuid(self.company_id),
            full_name: self.full_name,
            salary: Amount::from_halalas(self.salary_halalas),
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

/// Insert a new employee and its config in one transaction.
pub async fn register_employee(
    pool: &PgPool,
    employee: &Employee,
    config: &EmployeeGosiConfig,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    insert_employee(&mut *tx, employee).await?;
    upsert_config(&mut *tx, config).await?;
    tx.commit().await
}

// -- Configs ------------------------------------------------------------------

/// Insert or replace the config for `config.employee_id`.
pub async fn upsert_config<'e, E: PgExecutor<'e>>(
    executor: E,
    config: &EmployeeGosiConfig,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO employee_gosi_config (employee_id, gosi_system_type, nationality,
         current_employee_rate_bps, current_employer_rate_bps, effective_from, hire_date, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (employee_id) DO UPDATE SET
           gosi_system_type = EXCLUDED.gosi_system_type,
           nationality = EXCLUDED.nationality,
           current_employee_rate_bps = EXCLUDED.current_employee_rate_bps,
           current_employer_rate_bps = EXCLUDED.current_employer_rate_bps,
           effective_from = EXCLUDED.effective_from,
           hire_date = EXCLUDED.hire_date,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(config.employee_id.as_uuid())
    .bind(config.gosi_system_type.as_str())
    .bind(config.nationality.as_str())
    .bind(bps_to_db(config.current_employee_rate))
    .bind(bps_to_db(config.current_employer_rate))
    .bind(config.effective_from)
    .bind(config.hire_date)
    .bind(config.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Store a progressed config together with its domain event.
pub async fn apply_rate_change(
    pool: &PgPool,
    config: &EmployeeGosiConfig,
    event: &RateProgressionEvent,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    upsert_config(&mut *tx, config).await?;
    super::events::insert(&mut *tx, event).await?;
    tx.commit().await
}

pub async fn load_configs(pool: &PgPool) -> Result<Vec<EmployeeGosiConfig>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConfigRow>(
        "SELECT employee_id, gosi_system_type, nationality, current_employee_rate_bps,
         current_employer_rate_bps, effective_from, hire_date, updated_at
         FROM employee_gosi_config",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ConfigRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    employee_id: Uuid,
    gosi_system_type: String,
    nationality: String,
    current_employee_rate_bps: i32,
    current_employer_rate_bps: i32,
    effective_from: NaiveDate,
    hire_date: NaiveDate,
    updated_at: DateTime<Utc>,
}

impl ConfigRow {
    fn into_record(self) -> Result<EmployeeGosiConfig, sqlx::Error> {
        const TABLE: &str = "employee_gosi_config";
        Ok(EmployeeGosiConfig {
            employee_id: EmployeeId::from_uuid(self.employee_id),
            gosi_system_type: parse_enum::<SystemType>(TABLE, &self.gosi_system_type)?,
            nationality: parse_enum::<Nationality>(TABLE, &self.nationality)?,
            current_employee_rate: bps_from_db(TABLE, self.current_employee_rate_bps)?,
            current_employer_rate: bps_from_db(TABLE, self.current_employer_rate_bps)?,
            effective_from: self.effective_from,
            hire_date: self.hire_date,
            updated_at: self.updated_at,
        })
    }
}

// -- Column helpers -----------------------------------------------------------

fn bps_to_db(rate: RatePercent) -> i32 {
    // Rates never exceed 10000 bps.
    i32::try_from(rate.bps()).unwrap_or(i32::MAX)
}

fn bps_from_db(table: &str, bps: i32) -> Result<RatePercent, sqlx::Error> {
    u32::try_from(bps)
        .map_err(|_| decode_error(table, format!("negative rate {bps}")))
        .and_then(|b| RatePercent::from_bps(b).map_err(|e| decode_error(table, e)))
}

fn parse_enum<T>(table: &str, value: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(|e| decode_error(table, e))
}
