//! Service price using decimal arithmetic.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`ServicePrice`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Prices are never negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// Price of a clinic service in the clinic's single currency.
///
/// Always `>= 0`. Sums of prices (e.g. revenue) are themselves prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct ServicePrice(Decimal);

impl ServicePrice {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount < 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for ServicePrice {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServicePrice> for Decimal {
    fn from(price: ServicePrice) -> Self {
        price.0
    }
}

impl Add for ServicePrice {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for ServicePrice {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for ServicePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        let err = ServicePrice::new(Decimal::new(-1, 0)).unwrap_err();
        assert_eq!(err, PriceError::Negative(Decimal::new(-1, 0)));
    }

    #[test]
    fn test_accepts_zero_and_fractions() {
        assert_eq!(ServicePrice::new(Decimal::ZERO).unwrap(), ServicePrice::ZERO);
        let price = ServicePrice::new(Decimal::new(4999, 2)).unwrap();
        assert_eq!(price.to_string(), "49.99");
    }

    #[test]
    fn test_sum() {
        let total: ServicePrice = [ServicePrice::from_units(100), ServicePrice::from_units(50)]
            .into_iter()
            .sum();
        assert_eq!(total, ServicePrice::from_units(150));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<ServicePrice>("\"-5\"").is_err());
        let price: ServicePrice = serde_json::from_str("\"80.50\"").unwrap();
        assert_eq!(price.amount(), Decimal::new(8050, 2));
    }
}
