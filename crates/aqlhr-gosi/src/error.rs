//! GOSI engine errors.

use aqlhr_core::EmployeeId;
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{Nationality, SystemType};

/// Failures raised by the GOSI domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GosiError {
    /// The employee is not on any roster.
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),

    /// The employee has no GOSI configuration.
    #[error("GOSI configuration not found for employee {0}")]
    ConfigNotFound(EmployeeId),

    /// Neither the schedule nor the employee's configuration covers the date.
    #[error("no GOSI rate for {system_type}/{nationality} effective on or before {as_of}")]
    RateNotFound {
        system_type: SystemType,
        nationality: Nationality,
        as_of: NaiveDate,
    },

    /// The (system, nationality, effective_from) triple already has a row.
    #[error("GOSI rate for {system_type}/{nationality} effective {effective_from} already exists")]
    DuplicateRate {
        system_type: SystemType,
        nationality: Nationality,
        effective_from: NaiveDate,
    },

    /// The configured progression date is not a real calendar day.
    #[error("invalid progression policy: {0}")]
    InvalidPolicy(String),
}
