//! Decimal money amount.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! `Amount` wraps `rust_decimal::Decimal` for arbitrary precision and rounds
//! to two fractional digits with banker's rounding where money is compared.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fractional digits kept for stored money values.
pub const MONEY_SCALE: u32 = 2;

/// Fractional digits a stored line amount may carry (`NUMERIC(19, 4)`).
pub const STORAGE_SCALE: u32 = 4;

/// Integer digits a stored line amount may carry (`NUMERIC(19, 4)`).
pub const STORAGE_INTEGER_DIGITS: u32 = 15;

/// A signed monetary amount in the ledger's single currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub Decimal);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wraps a decimal value without rounding it.
    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the inner decimal.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Rounds to two fractional digits using banker's rounding (half-to-even).
    #[must_use]
    pub fn round_money(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven),
        )
    }

    /// Returns true if the amount is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is strictly less than zero.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Addition that returns `None` instead of overflowing.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Addition that clamps at the representable bounds.
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Subtraction that returns `None` instead of overflowing.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// True if the value needs no more than [`STORAGE_SCALE`] fractional
    /// digits. Trailing zeros do not count.
    #[must_use]
    pub fn fits_storage_scale(self) -> bool {
        self.0.normalize().scale() <= STORAGE_SCALE
    }

    /// True if the integer part has at most [`STORAGE_INTEGER_DIGITS`] digits.
    #[must_use]
    pub fn fits_storage_magnitude(self) -> bool {
        let limit = Decimal::from(10_i64.pow(STORAGE_INTEGER_DIGITS));
        self.0.abs() < limit
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.round_money().0)
    }
}

impl std::str::FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse::<Decimal>()?))
    }
}
