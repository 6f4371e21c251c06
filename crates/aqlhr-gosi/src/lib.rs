//! # aqlhr-gosi: GOSI Contribution Engine
//!
//! Pure domain logic for Saudi social-insurance (GOSI) contributions. No I/O:
//! the API layer owns storage and calls into this crate.
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`types`] | System type, nationality, roster and config records |
//! | [`schedule`] | The append-only rate history and rate resolution |
//! | [`contribution`] | salary × rate / 100, to the halala |
//! | [`preview`] | Company-wide rows and totals without drift |
//! | [`progression`] | The effective-date policy and per-employee rate progression |
//! | [`classification`] | OLD/NEW classification from hire date |

pub mod classification;
pub mod contribution;
pub mod error;
pub mod preview;
pub mod progression;
pub mod schedule;
pub mod types;

pub use classification::{classify, initial_config, new_system_start};
pub use contribution::{compute_contribution, ContributionBreakdown};
pub use error::GosiError;
pub use preview::{build_preview, CompanyPreview, PreviewRow, PreviewSummary};
pub use progression::{
    plan_progression, ProgressionOutcome, ProgressionPolicy, ProgressionReport,
    RateChange, RateProgressionEvent, AFFECTED_MODULES, PROGRESSION_REASON,
};
pub use schedule::{resolve_rates, RateSchedule};
pub use types::{
    Employee, EmployeeGosiConfig, Nationality, RateHistoryEntry, RatePair, RateSnapshot,
    RateSource, SystemType,
};
