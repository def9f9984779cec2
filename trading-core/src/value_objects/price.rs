//! Exact decimal price representation
//!
//! Exchange prices arrive as decimal strings. They are parsed straight into
//! `rust_decimal::Decimal` so that reported prices never pick up binary
//! floating-point rounding. Conversion to `f64` happens only at the
//! statistics boundary.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use super::DecimalParseError;

/// Exact decimal price
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    #[inline(always)]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create from integer (whole number)
    #[inline]
    pub fn from_int(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    #[inline(always)]
    pub const fn inner(self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Parse from a decimal string (e.g., "123.45678901")
    ///
    /// Rejects anything that cannot be represented exactly.
    pub fn parse(s: &str) -> Result<Self, DecimalParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalParseError::Empty);
        }
        Decimal::from_str_exact(s)
            .map(Self)
            .map_err(|e| DecimalParseError::Invalid {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Lossy conversion for the statistics engine
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for Price {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Price {
    type Output = Price;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self::Output {
        Price(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Price;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self::Output {
        Price(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Price;
    #[inline(always)]
    fn mul(self, rhs: Decimal) -> Self::Output {
        Price(self.0 * rhs)
    }
}
