//! # Fixed-Point Money and Rates
//!
//! [`Amount`] stores Saudi riyals as integer halalas (1/100 SAR).
//! [`RatePercent`] stores a percentage as integer basis points
//! (1/100 of a percent, so `9.75%` is `975`).
//!
//! ## Wire format
//!
//! - `Amount` serializes as a decimal string with exactly two fractional
//!   digits (`"9000.00"`) and deserializes from either a string or a JSON
//!   number. Numbers with more than two fractional digits are rejected
//!   rather than silently rounded.
//! - `RatePercent` serializes as a JSON number in percent (`9.75`) and
//!   deserializes from a number or a string.
//!
//! ## Rounding
//!
//! [`Amount::apply_rate`] is the only place a fractional halala can
//! appear. It rounds half away from zero.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

const HALALAS_PER_RIYAL: i64 = 100;
const BPS_PER_WHOLE: i128 = 10_000;
const MAX_RATE_BPS: u32 = 10_000;

/// Largest magnitude (in halalas) accepted from an `f64`, keeping every
/// value exactly representable as a double.
const MAX_F64_HALALAS: f64 = 9_007_199_254_740_991.0;

/// Tolerance when checking that a float carries at most two decimals.
const SCALE_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A signed SAR amount held as integer halalas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Zero riyals.
    pub const ZERO: Amount = Amount(0);

    /// Construct from a halala count.
    pub const fn from_halalas(halalas: i64) -> Self {
        Self(halalas)
    }

    /// Construct from whole riyals.
    pub fn from_riyals(riyals: i64) -> Option<Self> {
        riyals.checked_mul(HALALAS_PER_RIYAL).map(Self)
    }

    /// The amount in halalas.
    pub const fn halalas(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Parse a decimal string such as `"9000"`, `"9000.5"` or `"-12.34"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty()
            || frac.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_halalas: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };

        let magnitude = whole
            .checked_mul(HALALAS_PER_RIYAL)
            .and_then(|h| h.checked_add(frac_halalas))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -magnitude } else { magnitude }))
    }

    /// Convert a JSON number. Rejects non-finite values and values with
    /// more than two fractional digits.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(value.to_string());
        if !value.is_finite() {
            return Err(invalid());
        }
        let scaled = value * HALALAS_PER_RIYAL as f64;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > SCALE_EPSILON || rounded.abs() > MAX_F64_HALALAS {
            return Err(invalid());
        }
        Ok(Self(rounded as i64))
    }

    /// Multiply by a percentage rate, rounding half away from zero to the
    /// nearest halala.
    pub fn apply_rate(self, rate: RatePercent) -> Amount {
        let product = i128::from(self.0) * i128::from(rate.bps());
        let magnitude = (product.abs() + BPS_PER_WHOLE / 2) / BPS_PER_WHOLE;
        let signed = if product < 0 { -magnitude } else { magnitude };
        // |rate| <= 100% so the result never exceeds |self|.
        Amount(signed as i64)
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = HALALAS_PER_RIYAL as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a SAR amount as a number or decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_riyals(v).ok_or_else(|| E::custom(ValidationError::InvalidAmount(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        i64::try_from(v)
            .ok()
            .and_then(Amount::from_riyals)
            .ok_or_else(|| E::custom(ValidationError::InvalidAmount(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_f64(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

// ---------------------------------------------------------------------------
// RatePercent
// ---------------------------------------------------------------------------

/// A percentage between 0 and 100 held as integer basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RatePercent(u32);

impl RatePercent {
    /// 0%.
    pub const ZERO: RatePercent = RatePercent(0);

    /// Construct from basis points, rejecting values above 100%.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps > MAX_RATE_BPS {
            return Err(ValidationError::InvalidRate(format!("{bps} bps")));
        }
        Ok(Self(bps))
    }

    /// Construct from basis points, clamping to 100%. Used for compiled-in
    /// reference tables.
    pub const fn from_bps_clamped(bps: u32) -> Self {
        if bps > MAX_RATE_BPS {
            Self(MAX_RATE_BPS)
        } else {
            Self(bps)
        }
    }

    /// Basis points.
    pub const fn bps(self) -> u32 {
        self.0
    }

    /// The rate as a floating-point percentage, for display and JSON.
    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Convert a JSON number in percent.
    pub fn from_percent(value: f64) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidRate(value.to_string());
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(invalid());
        }
        let scaled = value * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > SCALE_EPSILON {
            return Err(invalid());
        }
        Self::from_bps(rounded as u32)
    }

    /// Parse a decimal percentage string such as `"9.75"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let amount =
            Amount::parse(s).map_err(|_| ValidationError::InvalidRate(s.to_string()))?;
        u32::try_from(amount.halalas())
            .map_err(|_| ValidationError::InvalidRate(s.to_string()))
            .and_then(|bps| {
                Self::from_bps(bps).map_err(|_| ValidationError::InvalidRate(s.to_string()))
            })
    }
}

impl fmt::Display for RatePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for RatePercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

struct RateVisitor;

impl<'de> Visitor<'de> for RateVisitor {
    type Value = RatePercent;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a percentage between 0 and 100")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RatePercent, E> {
        RatePercent::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RatePercent, E> {
        u32::try_from(v)
            .ok()
            .and_then(|p| p.checked_mul(100))
            .ok_or_else(|| E::custom(ValidationError::InvalidRate(v.to_string())))
            .and_then(|bps| RatePercent::from_bps(bps).map_err(E::custom))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RatePercent, E> {
        u32::try_from(v)
            .ok()
            .and_then(|p| p.checked_mul(100))
            .ok_or_else(|| E::custom(ValidationError::InvalidRate(v.to_string())))
            .and_then(|bps| RatePercent::from_bps(bps).map_err(E::custom))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RatePercent, E> {
        RatePercent::from_percent(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for RatePercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RateVisitor)
    }
}
