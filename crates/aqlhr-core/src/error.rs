//! # Validation Errors
//!
//! Rejections of malformed input at the boundary: identifiers, amounts,
//! rates, and dates. Each variant carries the offending value so the
//! message returned to the caller is actionable.

use thiserror::Error;

/// Domain primitive validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field expected to hold a UUID did not parse as one.
    #[error("invalid {field}: \"{value}\" is not a valid UUID")]
    InvalidUuid {
        /// Name of the field being parsed.
        field: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A monetary amount could not be parsed or is out of range.
    #[error("invalid amount: \"{0}\" (expected a decimal with at most 2 fractional digits)")]
    InvalidAmount(String),

    /// A percentage rate could not be parsed or is outside 0..=100.
    #[error("invalid rate: \"{0}\" (expected a percentage between 0 and 100 with at most 2 fractional digits)")]
    InvalidRate(String),

    /// A date string is not ISO 8601 (`YYYY-MM-DD`).
    #[error("invalid date: \"{0}\" (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A value is outside its permitted range.
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
