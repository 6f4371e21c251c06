//! Calendar date parsing for API inputs.

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Parse an ISO 8601 calendar date (`YYYY-MM-DD`).
///
/// A full timestamp (`2025-07-01T00:00:00Z`) is accepted and truncated to
/// its date part, since callers sometimes send `Date.toISOString()`.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = s.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}
