//! Exact decimal quantity representation

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use super::DecimalParseError;

/// Exact decimal quantity (size, filled amount, balance, position amount)
///
/// Signed: position amounts are negative for shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    #[inline(always)]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

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
    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

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

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for Quantity {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Quantity {
    type Output = Quantity;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self::Output {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self::Output {
        Quantity(self.0 - rhs.0)
    }
}

impl Neg for Quantity {
    type Output = Quantity;
    #[inline(always)]
    fn neg(self) -> Self::Output {
        Quantity(-self.0)
    }
}
