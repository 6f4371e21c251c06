//! KPI registry persistence.
//!
//! Categories and modules are upserted by id, KPIs by id (the in-memory
//! registry has already resolved `(module_id, kpi_order)` to an id).
//! Measurements are insert-only.

use aqlhr_core::{KpiId, ModuleId};
use aqlhr_kpi::{KpiMeasurement, Module, ModuleCategory, ModuleKpi, ScoreDirection};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::decode_error;

// -- Categories ---------------------------------------------------------------

pub async fn insert_category(pool: &PgPool, category: &ModuleCategory) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO module_categories (id, name, name_ar, description, created_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(&category.name_ar)
    .bind(&category.description)
    .bind(category.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_categories(pool: &PgPool) -> Result<Vec<ModuleCategory>, sqlx::Error> {
    sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, name_ar, description, created_at FROM module_categories",
    )
    .fetch_all(pool)
    .await
    .map(|rows| {
        rows.into_iter()
            .map(|r| ModuleCategory {
                id: r.id,
                name: r.name,
                name_ar: r.name_ar,
                description: r.description,
                created_at: r.created_at,
            })
            .collect()
    })
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    name_ar: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

// -- Modules ------------------------------------------------------------------

pub async fn upsert_module(pool: &PgPool, module: &Module) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO modules (id, name, name_ar, category_id, company_id, description,
         is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           name_ar = EXCLUDED.name_ar,
           category_id = EXCLUDED.category_id,
           description = EXCLUDED.description,
           is_active = EXCLUDED.is_active,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(module.id.as_uuid())
    .bind(&module.name)
    .bind(&module.name_ar)
    .bind(module.category_id)
    .bind(&module.company_id)
    .bind(&module.description)
    .bind(module.is_active)
    .bind(module.created_at)
    .bind(module.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_modules(pool: &PgPool) -> Result<Vec<Module>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ModuleRow>(
        "SELECT id, name, name_ar, category_id, company_id, description, is_active,
         created_at, updated_at
         FROM modules ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ModuleRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct ModuleRow {
    id: Uuid,
    name: String,
    name_ar: Option<String>,
    category_id: Uuid,
    company_id: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ModuleRow {
    fn into_record(self) -> Module {
        Module {
            id: ModuleId::from_uuid(self.id),
            name: self.name,
            name_ar: self.name_ar,
            category_id: self.category_id,
            company_id: self.company_id,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// -- KPIs ---------------------------------------------------------------------

/// Insert a KPI or replace its definition fields.
///
/// An existing row keeps its `current_value`/`current_value_at`; only
/// [`update_current_value`] moves those.
pub async fn upsert_kpi(pool: &PgPool, kpi: &ModuleKpi) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO module_kpis (id, module_id, kpi_name, kpi_name_ar, kpi_order, target_value,
         current_value, current_value_at, unit, calculation_method, direction, is_active, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         ON CONFLICT (id) DO UPDATE SET
           kpi_name = EXCLUDED.kpi_name,
           kpi_name_ar = EXCLUDED.kpi_name_ar,
           target_value = EXCLUDED.target_value,
           unit = EXCLUDED.unit,
           calculation_method = EXCLUDED.calculation_method,
           direction = EXCLUDED.direction,
           is_active = EXCLUDED.is_active,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(kpi.id.as_uuid())
    .bind(kpi.module_id.as_uuid())
    .bind(&kpi.kpi_name)
    .bind(&kpi.kpi_name_ar)
    .bind(kpi.kpi_order)
    .bind(kpi.target_value)
    .bind(kpi.current_value)
    .bind(kpi.current_value_at)
    .bind(&kpi.unit)
    .bind(&kpi.calculation_method)
    .bind(kpi.direction.map(|d| d.as_str()))
    .bind(kpi.is_active)
    .bind(kpi.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Write the reconciled current value. The row is only touched when the
/// stored value is not newer, so racing writers cannot regress it.
pub async fn update_current_value(pool: &PgPool, kpi: &ModuleKpi) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE module_kpis SET current_value = $2, current_value_at = $3, updated_at = $4
         WHERE id = $1 AND (current_value_at IS NULL OR current_value_at <= $3)",
    )
    .bind(kpi.id.as_uuid())
    .bind(kpi.current_value)
    .bind(kpi.current_value_at)
    .bind(kpi.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_kpis(pool: &PgPool) -> Result<Vec<ModuleKpi>, sqlx::Error> {
    let rows = sqlx::query_as::<_, KpiRow>(
        "SELECT id, module_id, kpi_name, kpi_name_ar, kpi_order, target_value, current_value,
         current_value_at, unit, calculation_method, direction, is_active, updated_at
         FROM module_kpis ORDER BY module_id, kpi_order",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(KpiRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct KpiRow {
    id: Uuid,
    module_id: Uuid,
    kpi_name: String,
    kpi_name_ar: Option<String>,
    kpi_order: i32,
    target_value: Option<f64>,
    current_value: Option<f64>,
    current_value_at: Option<DateTime<Utc>>,
    unit: Option<String>,
    calculation_method: Option<String>,
    direction: Option<String>,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

impl KpiRow {
    fn into_record(self) -> Result<ModuleKpi, sqlx::Error> {
        let direction = self
            .direction
            .as_deref()
            .map(str::parse::<ScoreDirection>)
            .transpose()
            .map_err(|e| decode_error("module_kpis", e))?;

        Ok(ModuleKpi {
            id: KpiId::from_uuid(self.id),
            module_id: ModuleId::from_uuid(self.module_id),
            kpi_name: self.kpi_name,
            kpi_name_ar: self.kpi_name_ar,
            kpi_order: self.kpi_order,
            target_value: self.target_value,
            current_value: self.current_value,
            current_value_at: self.current_value_at,
            unit: self.unit,
            calculation_method: self.calculation_method,
            direction,
            is_active: self.is_active,
            updated_at: self.updated_at,
        })
    }
}

// -- Measurements -------------------------------------------------------------

pub async fn insert_measurement(
    pool: &PgPool,
    measurement: &KpiMeasurement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kpi_measurements (id, kpi_id, measured_value, measured_at,
         measurement_source, notes, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(measurement.id)
    .bind(measurement.kpi_id.as_uuid())
    .bind(measurement.measured_value)
    .bind(measurement.measured_at)
    .bind(&measurement.measurement_source)
    .bind(&measurement.notes)
    .bind(measurement.recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_measurements(pool: &PgPool) -> Result<Vec<KpiMeasurement>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MeasurementRow>(
        "SELECT id, kpi_id, measured_value, measured_at, measurement_source, notes, recorded_at
         FROM kpi_measurements ORDER BY measured_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| KpiMeasurement {
            id: r.id,
            kpi_id: KpiId::from_uuid(r.kpi_id),
            measured_value: r.measured_value,
            measured_at: r.measured_at,
            measurement_source: r.measurement_source,
            notes: r.notes,
            recorded_at: r.recorded_at,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    id: Uuid,
    kpi_id: Uuid,
    measured_value: f64,
    measured_at: DateTime<Utc>,
    measurement_source: Option<String>,
    notes: Option<String>,
    recorded_at: DateTime<Utc>,
}
