//! OLD/NEW system classification and initial configuration.

use aqlhr_core::EmployeeId;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::GosiError;
use crate::schedule::RateSchedule;
use crate::types::{EmployeeGosiConfig, Nationality, SystemType};

/// First hire date registered under the NEW system (2024-07-03).
pub fn new_system_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 3).unwrap_or_default()
}

pub fn classify(hire_date: NaiveDate) -> SystemType {
    if hire_date >= new_system_start() {
        SystemType::New
    } else {
        SystemType::Old
    }
}

/// Build the configuration for a newly registered employee.
///
/// Current rates are taken from the schedule row in force on `today`
/// (or on the hire date, for future hires). `effective_from` is never
/// earlier than the hire date.
pub fn initial_config(
    employee_id: EmployeeId,
    nationality: Nationality,
    hire_date: NaiveDate,
    schedule: &RateSchedule,
    now: DateTime<Utc>,
) -> Result<EmployeeGosiConfig, GosiError> {
    let system_type = classify(hire_date);
    let as_of = now.date_naive().max(hire_date);
    let entry = schedule
        .resolve(system_type, nationality, as_of)
        .ok_or(GosiError::RateNotFound {
            system_type,
            nationality,
            as_of,
        })?;

    Ok(EmployeeGosiConfig {
        employee_id,
        gosi_system_type: system_type,
        nationality,
        current_employee_rate: entry.employee_rate,
        current_employer_rate: entry.employer_rate,
        effective_from: entry.effective_from.max(hire_date),
        hire_date,
        updated_at: now,
    })
}
