//! # Money Type
//!
//! Integer money for sale and return totals.
//!
//! All amounts are held in cents (`i64`). Fuel is priced per litre, and
//! dispensed volumes arrive in millilitres, so [`Money::for_volume`] does the
//! price × volume step with integer math and rounds half up to the cent.
//!
//! ```rust
//! use fuelpos_core::money::Money;
//!
//! // 40.5 litres at 1.89/litre
//! let total = Money::for_volume(Money::from_cents(189), 40_500);
//! assert_eq!(total.cents(), 7655);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// An amount of money in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Unit price × whole quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Price per litre × volume in millilitres, rounded half up.
    pub fn for_volume(price_per_litre: Money, millilitres: i64) -> Self {
        let scaled = price_per_litre.0 as i128 * millilitres as i128;
        let rounded = if scaled >= 0 {
            (scaled + 500) / 1000
        } else {
            (scaled - 500) / 1000
        };
        Money(rounded as i64)
    }

    /// Tax at `bps` basis points (1600 = 16%), rounded half up.
    pub fn tax_at(&self, bps: u32) -> Self {
        Money(((self.0 as i128 * bps as i128 + 5000) / 10000) as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_pricing_rounds_half_up() {
        // 1.005 litres at 1.00 = 1.005 → 1.01
        assert_eq!(Money::for_volume(Money::from_cents(100), 1_005).cents(), 101);
        assert_eq!(Money::for_volume(Money::from_cents(189), 1_000).cents(), 189);
        assert_eq!(Money::for_volume(Money::from_cents(189), 0).cents(), 0);
    }

    #[test]
    fn test_tax_and_display() {
        assert_eq!(Money::from_cents(1000).tax_at(1600).cents(), 160);
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 355);
    }
}
