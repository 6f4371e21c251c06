//! # Annual Rate Progression
//!
//! NEW-system Saudi employees move up the rate schedule once a year. The
//! date is a [`ProgressionPolicy`] (July 1st unless configured otherwise).
//!
//! Planning is pure: [`plan_progression`] returns one tagged
//! [`ProgressionOutcome`] per eligible employee. Employees without a
//! schedule row for the effective date are reported as `skipped`, never
//! dropped. The API layer applies `updated` outcomes, downgrading any that
//! fail to persist to `failed`.

use aqlhr_core::EmployeeId;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GosiError;
use crate::schedule::RateSchedule;
use crate::types::{EmployeeGosiConfig, Nationality, RatePair, SystemType};

pub const PROGRESSION_REASON: &str = "annual_rate_progression";
pub const PROGRESSION_EVENT_TYPE: &str = "gosi_rate_progression";

/// Downstream modules notified of a rate change.
pub const AFFECTED_MODULES: [&str; 3] = ["payroll", "compliance", "reporting"];

// -- Policy -------------------------------------------------------------------

/// The calendar day on which progression runs each year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionPolicy {
    month: u32,
    day: u32,
}

impl ProgressionPolicy {
    /// Validate against a non-leap year so the date exists every year.
    pub fn new(month: u32, day: u32) -> Result<Self, GosiError> {
        if NaiveDate::from_ymd_opt(2025, month, day).is_none() {
            return Err(GosiError::InvalidPolicy(format!(
                "month {month} day {day} is not a date that occurs every year"
            )));
        }
        Ok(Self { month, day })
    }

    pub fn july_first() -> Self {
        Self { month: 7, day: 1 }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Whether `date` is the progression day.
    pub fn matches(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

impl Default for ProgressionPolicy {
    fn default() -> Self {
        Self::july_first()
    }
}

impl std::fmt::Display for ProgressionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--{:02}-{:02}", self.month, self.day)
    }
}

// -- Outcomes -----------------------------------------------------------------

/// A planned (or applied) rate change for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub employee_id: EmployeeId,
    pub old_rates: RatePair,
    pub new_rates: RatePair,
    pub effective_from: NaiveDate,
}

impl RateChange {
    pub fn apply(&self, config: &mut EmployeeGosiConfig, now: DateTime<Utc>) {
        config.current_employee_rate = self.new_rates.employee_rate;
        config.current_employer_rate = self.new_rates.employer_rate;
        config.effective_from = self.effective_from;
        config.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressionOutcome {
    Updated(RateChange),
    Skipped {
        employee_id: EmployeeId,
        reason: String,
    },
    Failed {
        employee_id: EmployeeId,
        error: String,
    },
}

impl ProgressionOutcome {
    pub fn employee_id(&self) -> EmployeeId {
        match self {
            Self::Updated(change) => change.employee_id,
            Self::Skipped { employee_id, .. } | Self::Failed { employee_id, .. } => *employee_id,
        }
    }
}

/// Plan progression to `effective_date` for every eligible employee.
///
/// Employees that are not NEW-system Saudis are never included. An
/// eligible employee is skipped when the schedule has no
/// `(NEW, SAUDI, effective_date)` row, or when that row is already applied.
pub fn plan_progression(
    configs: &[EmployeeGosiConfig],
    schedule: &RateSchedule,
    effective_date: NaiveDate,
) -> Vec<ProgressionOutcome> {
    let target = schedule.exact(SystemType::New, Nationality::Saudi, effective_date);

    let mut eligible: Vec<&EmployeeGosiConfig> = configs
        .iter()
        .filter(|c| c.is_progression_eligible())
        .collect();
    eligible.sort_by_key(|c| c.employee_id);

    eligible
        .into_iter()
        .map(|config| match target {
            None => ProgressionOutcome::Skipped {
                employee_id: config.employee_id,
                reason: format!("no NEW/SAUDI rate effective {effective_date}"),
            },
            Some(entry)
                if config.effective_from == effective_date
                    && config.current_rates() == entry.rates() =>
            {
                ProgressionOutcome::Skipped {
                    employee_id: config.employee_id,
                    reason: "rates already applied".to_string(),
                }
            }
            Some(entry) => ProgressionOutcome::Updated(RateChange {
                employee_id: config.employee_id,
                old_rates: config.current_rates(),
                new_rates: entry.rates(),
                effective_from: effective_date,
            }),
        })
        .collect()
}

// -- Domain event -------------------------------------------------------------

/// Emitted once per successfully updated employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateProgressionEvent {
    pub id: Uuid,
    pub event_type: String,
    pub employee_id: EmployeeId,
    pub old_rates: RatePair,
    pub new_rates: RatePair,
    pub effective_from: NaiveDate,
    pub reason: String,
    pub affected_modules: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl RateProgressionEvent {
    pub fn from_change(change: &RateChange, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: PROGRESSION_EVENT_TYPE.to_string(),
            employee_id: change.employee_id,
            old_rates: change.old_rates,
            new_rates: change.new_rates,
            effective_from: change.effective_from,
            reason: PROGRESSION_REASON.to_string(),
            affected_modules: AFFECTED_MODULES.iter().map(|m| m.to_string()).collect(),
            created_at: now,
        }
    }
}

// -- Report -------------------------------------------------------------------

/// Result of one progression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionReport {
    pub effective_date: NaiveDate,
    pub updated_count: usize,
    pub updated_employees: Vec<RateChange>,
    pub skipped_employee_ids: Vec<EmployeeId>,
    pub failed_count: usize,
    pub results: Vec<ProgressionOutcome>,
}

impl ProgressionReport {
    pub fn from_outcomes(effective_date: NaiveDate, results: Vec<ProgressionOutcome>) -> Self {
        let updated_employees: Vec<RateChange> = results
            .iter()
            .filter_map(|o| match o {
                ProgressionOutcome::Updated(change) => Some(change.clone()),
                _ => None,
            })
            .collect();
        let skipped_employee_ids = results
            .iter()
            .filter(|o| matches!(o, ProgressionOutcome::Skipped { .. }))
            .map(ProgressionOutcome::employee_id)
            .collect();
        let failed_count = results
            .iter()
            .filter(|o| matches!(o, ProgressionOutcome::Failed { .. }))
            .count();

        Self {
            effective_date,
            updated_count: updated_employees.len(),
            updated_employees,
            skipped_employee_ids,
            failed_count,
            results,
        }
    }
}
