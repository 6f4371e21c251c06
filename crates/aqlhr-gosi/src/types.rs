//! # GOSI Records
//!
//! The roster entry ([`Employee`]), its social-insurance configuration
//! ([`EmployeeGosiConfig`]), and the reference rate table row
//! ([`RateHistoryEntry`]).

use std::str::FromStr;

use aqlhr_core::{Amount, CompanyId, EmployeeId, RatePercent};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// GOSI contribution schedule an employee is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemType {
    /// Registered before the 2024 reform.
    Old,
    /// Registered on or after 2024-07-03; subject to annual progression.
    New,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Old => "OLD",
            Self::New => "NEW",
        }
    }
}

impl std::fmt::Display for SystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OLD" => Ok(Self::Old),
            "NEW" => Ok(Self::New),
            other => Err(format!("unknown GOSI system type: {other}")),
        }
    }
}

/// Nationality bucket used by the rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Nationality {
    Saudi,
    NonSaudi,
}

impl Nationality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saudi => "SAUDI",
            Self::NonSaudi => "NON_SAUDI",
        }
    }
}

impl std::fmt::Display for Nationality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Nationality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SAUDI" => Ok(Self::Saudi),
            "NON_SAUDI" => Ok(Self::NonSaudi),
            other => Err(format!("unknown nationality: {other}")),
        }
    }
}

/// Employee and employer rates, in percent of salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePair {
    pub employee_rate: RatePercent,
    pub employer_rate: RatePercent,
}

impl RatePair {
    pub const fn new(employee_rate: RatePercent, employer_rate: RatePercent) -> Self {
        Self {
            employee_rate,
            employer_rate,
        }
    }
}

/// An employee on a company roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub company_id: CompanyId,
    pub full_name: String,
    /// Monthly basic salary subject to GOSI.
    pub salary: Amount,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-employee GOSI configuration.
///
/// `current_*_rate` and `effective_from` are a cached projection of the
/// rate schedule, advanced by the progression job for NEW-system Saudis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeGosiConfig {
    pub employee_id: EmployeeId,
    pub gosi_system_type: SystemType,
    pub nationality: Nationality,
    pub current_employee_rate: RatePercent,
    pub current_employer_rate: RatePercent,
    pub effective_from: NaiveDate,
    pub hire_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeGosiConfig {
    pub fn current_rates(&self) -> RatePair {
        RatePair::new(self.current_employee_rate, self.current_employer_rate)
    }

    /// Only NEW-system Saudi employees take part in annual progression.
    pub fn is_progression_eligible(&self) -> bool {
        self.gosi_system_type == SystemType::New && self.nationality == Nationality::Saudi
    }
}

/// One row of the reference rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    pub id: Uuid,
    pub system_type: SystemType,
    pub nationality: Nationality,
    pub employee_rate: RatePercent,
    pub employer_rate: RatePercent,
    pub effective_from: NaiveDate,
}

impl RateHistoryEntry {
    pub fn new(
        system_type: SystemType,
        nationality: Nationality,
        rates: RatePair,
        effective_from: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            system_type,
            nationality,
            employee_rate: rates.employee_rate,
            employer_rate: rates.employer_rate,
            effective_from,
        }
    }

    pub fn rates(&self) -> RatePair {
        RatePair::new(self.employee_rate, self.employer_rate)
    }
}

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    RateHistory,
    EmployeeConfig,
}

/// The rates applicable to one employee on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub system_type: SystemType,
    pub nationality: Nationality,
    pub rates: RatePair,
    pub effective_from: NaiveDate,
    pub source: RateSource,
}
