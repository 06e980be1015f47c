//! Integer minor-unit monetary value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Minor units per major unit (cents per real/dollar).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Largest amount a single payment may carry: 999,999.99 in major units.
pub const DEFAULT_MAX_AMOUNT: Money = Money(99_999_999);

/// Money stored as a count of minor currency units (cents).
///
/// All accumulation happens on the integer value. Conversion to a
/// floating display value is done once, by [`Money::to_display`], when a
/// figure leaves the system in a report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ToSchema,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new Money value from minor units.
    pub fn new(minor_units: i64) -> Result<Self, DomainError> {
        if minor_units < 0 {
            return Err(DomainError::InvalidAmount(format!(
                "amount cannot be negative: {}",
                minor_units
            )));
        }
        Ok(Self(minor_units))
    }

    /// Creates a zero-value Money.
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition, `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums a sequence of amounts without any intermediate rounding.
    pub fn sum<I: IntoIterator<Item = Money>>(amounts: I) -> Money {
        amounts.into_iter().fold(Money::ZERO, |acc, m| acc + m)
    }

    /// Divides a total by a count for an average, rounding half-up once
    /// to the nearest minor unit. Returns zero when `count` is zero.
    pub fn average(total: Money, count: u64) -> Money {
        if count == 0 {
            return Money::ZERO;
        }
        let total = i128::from(total.0);
        let count = i128::from(count);
        let rounded = (2 * total + count) / (2 * count);
        Money(i64::try_from(rounded).unwrap_or(i64::MAX))
    }

    /// Major-unit value rounded to two decimal places, for presentation.
    pub fn to_display(&self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money::sum(iter)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 / MINOR_PER_MAJOR;
        let minor = (self.0 % MINOR_PER_MAJOR).abs();
        write!(f, "{}.{:02}", major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let money = Money::new(15050).unwrap();
        assert_eq!(money.minor_units(), 15050);
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(-100);
        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[test]
    fn test_sum_is_exact() {
        let amounts = [1000, 2000, 3333].map(|a| Money::new(a).unwrap());
        assert_eq!(Money::sum(amounts).minor_units(), 6333);
        assert_eq!(Money::sum(amounts).to_display(), 63.33);
    }

    #[test]
    fn test_many_small_amounts_do_not_drift() {
        // 0.1 added a thousand times in floating point is not 100.0
        let total: Money = std::iter::repeat_n(Money::new(10).unwrap(), 1000).sum();
        assert_eq!(total.minor_units(), 10_000);
        assert_eq!(total.to_display(), 100.0);
    }

    #[test]
    fn test_average_rounds_half_up_once() {
        // 10 / 4 = 2.5 minor units -> 3
        assert_eq!(Money::average(Money::new(10).unwrap(), 4).minor_units(), 3);
        // 10 / 3 = 3.33 -> 3
        assert_eq!(Money::average(Money::new(10).unwrap(), 3).minor_units(), 3);
        // 6333 / 3 = 2111 exactly
        assert_eq!(
            Money::average(Money::new(6333).unwrap(), 3).minor_units(),
            2111
        );
    }

    #[test]
    fn test_average_of_nothing_is_zero() {
        assert_eq!(Money::average(Money::new(500).unwrap(), 0), Money::ZERO);
    }

    #[test]
    fn test_addition_saturates() {
        let big = Money::new(i64::MAX).unwrap();
        assert_eq!((big + Money::new(1).unwrap()).minor_units(), i64::MAX);
        assert!(big.checked_add(Money::new(1).unwrap()).is_none());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(15050).unwrap().to_string(), "150.50");
        assert_eq!(Money::new(7).unwrap().to_string(), "0.07");
    }
}
