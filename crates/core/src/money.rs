//! Fixed-point unit price.

use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Unit price with exactly two fractional digits.
///
/// Mirrors a `NUMERIC(10, 2)` column: non-negative, at most 8 integer digits.
/// Inputs with more than two fractional digits are rounded half away from zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const SCALE: u32 = 2;

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "price cannot be negative (got {value})"
            )));
        }

        let mut rounded = value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded >= Decimal::new(100_000_000, 0) {
            return Err(DomainError::validation(format!(
                "price {value} exceeds 8 integer digits"
            )));
        }
        rounded.rescale(Self::SCALE);
        Ok(Self(rounded))
    }

    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Value of `quantity` units at this price.
    pub fn times(&self, quantity: u32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl ValueObject for Price {}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| DomainError::validation(format!("invalid price '{s}'")))?;
        Self::new(value)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_keeps_two_fractional_digits() {
        let p: Price = "12.5".parse().unwrap();
        assert_eq!(p.to_string(), "12.50");
        assert_eq!(Price::zero().to_string(), "0.00");
    }

    #[test]
    fn rounds_extra_precision_half_away_from_zero() {
        let p: Price = "0.125".parse().unwrap();
        assert_eq!(p.to_string(), "0.13");
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(matches!("-1".parse::<Price>(), Err(DomainError::Validation(_))));
        assert!(matches!("abc".parse::<Price>(), Err(DomainError::Validation(_))));
        assert!(matches!("100000000".parse::<Price>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn multiplication_is_exact() {
        let p: Price = "0.10".parse().unwrap();
        assert_eq!(p.times(3), Decimal::new(30, 2));
    }
}
