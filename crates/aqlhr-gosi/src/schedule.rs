//! # Rate Schedule
//!
//! The append-only GOSI rate table. Rows are unique per
//! `(system_type, nationality, effective_from)`; the applicable row for a
//! date is the one with the latest `effective_from` on or before it.
//!
//! ## Default schedule
//!
//! | System | Nationality | Employee | Employer | From |
//! |--------|-------------|----------|----------|------|
//! | OLD | SAUDI | 9.75 | 11.75 | 1970-01-01 |
//! | OLD | NON_SAUDI | 0.00 | 2.00 | 1970-01-01 |
//! | NEW | NON_SAUDI | 0.00 | 2.00 | 1970-01-01 |
//! | NEW | SAUDI | 9.75 | 11.75 | 2024-07-03 |
//! | NEW | SAUDI | +0.50 | +0.50 | every July 1st, 2025–2028 |

use aqlhr_core::RatePercent;
use chrono::NaiveDate;

use crate::error::GosiError;
use crate::types::{
    EmployeeGosiConfig, Nationality, RateHistoryEntry, RatePair, RateSnapshot, RateSource,
    SystemType,
};

/// In-memory view of the rate table, kept sorted by
/// `(system_type, nationality, effective_from)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSchedule {
    entries: Vec<RateHistoryEntry>,
}

impl RateSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows, rejecting duplicate triples.
    pub fn from_entries(
        entries: impl IntoIterator<Item = RateHistoryEntry>,
    ) -> Result<Self, GosiError> {
        let mut schedule = Self::new();
        for entry in entries {
            schedule.insert(entry)?;
        }
        Ok(schedule)
    }

    /// Append a row. Fails if the triple is already present.
    pub fn insert(&mut self, entry: RateHistoryEntry) -> Result<(), GosiError> {
        let key = sort_key(&entry);
        match self.entries.binary_search_by(|e| sort_key(e).cmp(&key)) {
            Ok(_) => Err(GosiError::DuplicateRate {
                system_type: entry.system_type,
                nationality: entry.nationality,
                effective_from: entry.effective_from,
            }),
            Err(pos) => {
                self.entries.insert(pos, entry);
                Ok(())
            }
        }
    }

    /// The row in force on `as_of`.
    pub fn resolve(
        &self,
        system_type: SystemType,
        nationality: Nationality,
        as_of: NaiveDate,
    ) -> Option<&RateHistoryEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.system_type == system_type
                    && e.nationality == nationality
                    && e.effective_from <= as_of
            })
            .max_by_key(|e| e.effective_from)
    }

    /// The row starting exactly on `effective_from`, if any.
    pub fn exact(
        &self,
        system_type: SystemType,
        nationality: Nationality,
        effective_from: NaiveDate,
    ) -> Option<&RateHistoryEntry> {
        self.entries.iter().find(|e| {
            e.system_type == system_type
                && e.nationality == nationality
                && e.effective_from == effective_from
        })
    }

    pub fn entries(&self) -> &[RateHistoryEntry] {
        &self.entries
    }

    /// Rows matching optional filters, in `effective_from` order within
    /// each (system, nationality) group.
    pub fn filtered(
        &self,
        system_type: Option<SystemType>,
        nationality: Option<Nationality>,
    ) -> Vec<RateHistoryEntry> {
        self.entries
            .iter()
            .filter(|e| system_type.map_or(true, |s| e.system_type == s))
            .filter(|e| nationality.map_or(true, |n| e.nationality == n))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The compiled-in Saudi schedule used when no database is attached.
    pub fn default_schedule() -> Self {
        let epoch = NaiveDate::default();
        let mut rows = vec![
            (SystemType::Old, Nationality::Saudi, 975, 1175, epoch),
            (SystemType::Old, Nationality::NonSaudi, 0, 200, epoch),
            (SystemType::New, Nationality::NonSaudi, 0, 200, epoch),
            (
                SystemType::New,
                Nationality::Saudi,
                975,
                1175,
                crate::classification::new_system_start(),
            ),
        ];
        for (step, year) in (2025..=2028).enumerate() {
            let bump = 50 * (step as u32 + 1);
            if let Some(july_first) = NaiveDate::from_ymd_opt(year, 7, 1) {
                rows.push((
                    SystemType::New,
                    Nationality::Saudi,
                    975 + bump,
                    1175 + bump,
                    july_first,
                ));
            }
        }

        let entries = rows
            .into_iter()
            .map(|(system, nationality, employee_bps, employer_bps, from)| {
                let rates = RatePair::new(
                    RatePercent::from_bps_clamped(employee_bps),
                    RatePercent::from_bps_clamped(employer_bps),
                );
                RateHistoryEntry::new(system, nationality, rates, from)
            });
        // An empty schedule fails the readiness probe.
        Self::from_entries(entries).unwrap_or_else(|e| {
            tracing::error!(error = %e, "default rate schedule rejected");
            Self::new()
        })
    }
}

fn sort_key(e: &RateHistoryEntry) -> (SystemType, Nationality, NaiveDate) {
    (e.system_type, e.nationality, e.effective_from)
}

/// Resolve the rates for one employee on `as_of`.
///
/// The schedule wins when it has a row for the employee's
/// (system, nationality) on or before the date. Otherwise the employee's
/// own configured rates apply if they were already effective. Anything
/// else is [`GosiError::RateNotFound`].
pub fn resolve_rates(
    config: &EmployeeGosiConfig,
    schedule: &RateSchedule,
    as_of: NaiveDate,
) -> Result<RateSnapshot, GosiError> {
    if let Some(entry) = schedule.resolve(config.gosi_system_type, config.nationality, as_of) {
        return Ok(RateSnapshot {
            system_type: config.gosi_system_type,
            nationality: config.nationality,
            rates: entry.rates(),
            effective_from: entry.effective_from,
            source: RateSource::RateHistory,
        });
    }

    if config.effective_from <= as_of {
        return Ok(RateSnapshot {
            system_type: config.gosi_system_type,
            nationality: config.nationality,
            rates: config.current_rates(),
            effective_from: config.effective_from,
            source: RateSource::EmployeeConfig,
        });
    }

    Err(GosiError::RateNotFound {
        system_type: config.gosi_system_type,
        nationality: config.nationality,
        as_of,
    })
}
