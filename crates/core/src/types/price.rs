//! Type-safe price representation.
//!
//! Catalog prices are stored as `NUMERIC(9, 2)` and carried as [`Decimal`].
//! Anything that is summed, multiplied by a quantity, or sent to the payment
//! processor is first converted to [`MinorUnits`] (pence for GBP) so totals
//! are exact integers.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors raised while converting between decimal prices and minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Prices may not be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount has more decimal places than the currency supports.
    #[error("price {amount} has more precision than {currency} allows")]
    SubMinorPrecision {
        /// The rejected amount.
        amount: Decimal,
        /// Currency the amount was expressed in.
        currency: CurrencyCode,
    },
    /// The amount does not fit in an `i64` of minor units.
    #[error("price overflow")]
    Overflow,
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// ISO 4217 currency codes accepted by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    GBP,
    EUR,
    USD,
}

impl CurrencyCode {
    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        match self {
            Self::GBP | Self::EUR | Self::USD => 2,
        }
    }

    /// Lowercase code as expected by Stripe (`gbp`).
    #[must_use]
    pub const fn as_stripe_str(self) -> &'static str {
        match self {
            Self::GBP => "gbp",
            Self::EUR => "eur",
            Self::USD => "usd",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GBP => "£",
            Self::EUR => "€",
            Self::USD => "$",
        }
    }

    const fn scale(self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::GBP => "GBP",
            Self::EUR => "EUR",
            Self::USD => "USD",
        };
        f.write_str(code)
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GBP" => Ok(Self::GBP),
            "EUR" => Ok(Self::EUR),
            "USD" => Ok(Self::USD),
            _ => Err(PriceError::UnsupportedCurrency(s.to_owned())),
        }
    }
}

/// An integer amount in the currency's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw minor-unit amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Add two amounts.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Convert back into a decimal amount of the given currency.
    #[must_use]
    pub fn to_decimal(self, currency: CurrencyCode) -> Decimal {
        Decimal::new(self.0, currency.exponent())
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (pounds, not pence).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Build a price from a minor-unit amount.
    #[must_use]
    pub fn from_minor_units(minor: MinorUnits, currency_code: CurrencyCode) -> Self {
        Self::new(minor.to_decimal(currency_code), currency_code)
    }

    /// Convert to minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts,
    /// [`PriceError::SubMinorPrecision`] if the amount cannot be expressed
    /// exactly in minor units (e.g. `1.005` GBP), and [`PriceError::Overflow`]
    /// if the result does not fit an `i64`.
    pub fn to_minor_units(&self) -> Result<MinorUnits, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let scaled = self
            .amount
            .checked_mul(Decimal::from(self.currency_code.scale()))
            .ok_or(PriceError::Overflow)?;

        if !scaled.fract().is_zero() {
            return Err(PriceError::SubMinorPrecision {
                amount: self.amount,
                currency: self.currency_code,
            });
        }

        scaled.to_i64().map(MinorUnits).ok_or(PriceError::Overflow)
    }

    /// Apply a variant's price adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the adjusted price drops below zero.
    pub fn adjusted(&self, delta: Decimal) -> Result<Self, PriceError> {
        let amount = self.amount.checked_add(delta).ok_or(PriceError::Overflow)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self::new(amount, self.currency_code))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(self.currency_code.exponent())
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gbp(s: &str) -> Price {
        Price::new(s.parse().unwrap(), CurrencyCode::GBP)
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(gbp("12.50").to_minor_units().unwrap(), MinorUnits::new(1250));
        assert_eq!(gbp("7").to_minor_units().unwrap(), MinorUnits::new(700));
        assert_eq!(gbp("0.00").to_minor_units().unwrap(), MinorUnits::ZERO);
    }

    #[test]
    fn test_to_minor_units_avoids_float_drift() {
        // 0.29 * 100 is 28.999999999999996 in f64
        assert_eq!(gbp("0.29").to_minor_units().unwrap(), MinorUnits::new(29));
        assert_eq!(gbp("19.99").to_minor_units().unwrap(), MinorUnits::new(1999));
    }

    #[test]
    fn test_to_minor_units_rejects_sub_penny() {
        assert!(matches!(
            gbp("1.005").to_minor_units(),
            Err(PriceError::SubMinorPrecision { .. })
        ));
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert!(matches!(
            gbp("-1.00").to_minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_adjusted() {
        assert_eq!(gbp("20.00").adjusted("5.50".parse().unwrap()).unwrap(), gbp("25.50"));
        assert_eq!(gbp("20.00").adjusted("-4.00".parse().unwrap()).unwrap(), gbp("16.00"));
        assert!(gbp("2.00").adjusted("-4.00".parse().unwrap()).is_err());
    }

    #[test]
    fn test_round_trip_from_minor_units() {
        let price = Price::from_minor_units(MinorUnits::new(3200), CurrencyCode::GBP);
        assert_eq!(price.to_string(), "£32.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("gbp".parse::<CurrencyCode>().unwrap(), CurrencyCode::GBP);
        assert_eq!(" USD ".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("JPY".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::EUR.as_stripe_str(), "eur");
    }

    #[test]
    fn test_minor_unit_arithmetic() {
        let line = MinorUnits::new(1250).checked_mul(2).unwrap();
        assert_eq!(line, MinorUnits::new(2500));
        assert_eq!(line.checked_add(MinorUnits::new(700)).unwrap(), MinorUnits::new(3200));
        assert!(MinorUnits::new(i64::MAX).checked_mul(2).is_none());
    }
}
