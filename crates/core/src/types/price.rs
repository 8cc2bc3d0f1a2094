//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (rupees, not paise).
//! The payment provider speaks in minor units, so conversions in both
//! directions live here.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
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

    /// Create a price from an amount in minor units (paise, cents).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency_code,
        }
    }

    /// Amount in minor units, rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        let scaled = (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        i64::try_from(scaled).ok()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{}{rounded:.2}", self.currency_code.symbol())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl core::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_unit_conversion() {
        let price = Price::from_minor_units(149_950, CurrencyCode::INR);
        assert_eq!(price.amount, Decimal::new(149_950, 2));
        assert_eq!(price.to_minor_units(), Some(149_950));
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        let price = Price::new(Decimal::new(10_005, 3), CurrencyCode::INR);
        assert_eq!(price.to_minor_units(), Some(1001));
    }

    #[test]
    fn test_display_uses_symbol_and_two_places() {
        let price = Price::new(Decimal::new(2500, 0), CurrencyCode::INR);
        assert_eq!(price.to_string(), "₹2500.00");
    }

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!("inr".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
