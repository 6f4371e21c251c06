#![deny(missing_docs)]

//! # aqlhr-core: Foundational Types for the AqlHR Engines
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal crate dependencies. Only `serde`, `thiserror`,
//! `chrono`, and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a
//!    [`CompanyId`] where an [`EmployeeId`] is expected.
//!
//! 2. **No floats for money.** Salaries and contributions are [`Amount`]s
//!    in halalas; rates are [`RatePercent`]s in basis points. Contribution
//!    math is integer math with one rounding rule.
//!
//! 3. **[`ValidationError`] for every rejected input.** Structured errors
//!    with `thiserror`, no `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use error::ValidationError;
pub use identity::{CompanyId, EmployeeId, KpiId, ModuleId};
pub use money::{Amount, RatePercent};
pub use temporal::parse_date;
