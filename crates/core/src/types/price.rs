//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts are kept in the currency's standard unit (e.g. euros, not cents)
/// as decimals; float arithmetic never touches money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
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

    /// Create a price from an amount in the smallest currency unit (cents).
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(cents, 2),
            currency_code,
        }
    }

    /// A zero price in the given currency.
    #[must_use]
    pub fn zero(currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency_code,
        }
    }

    /// Multiply by a quantity (line total for a cart row).
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * Decimal::from(quantity),
            currency_code: self.currency_code,
        }
    }

    /// Add another price of the same currency.
    ///
    /// Returns `None` when the currencies differ; mixed-currency carts are
    /// rejected upstream, so a mismatch here is a logic error to surface.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency_code != other.currency_code {
            return None;
        }
        Some(Self {
            amount: self.amount + other.amount,
            currency_code: self.currency_code,
        })
    }

    /// Format for display (e.g. "€129.00").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EUR,
    USD,
    GBP,
    CHF,
    SEK,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::EUR => "€",
            Self::USD => "$",
            Self::GBP => "£",
            Self::CHF => "CHF ",
            Self::SEK => "kr ",
        }
    }

    /// ISO 4217 alphabetic code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
            Self::CHF => "CHF",
            Self::SEK => "SEK",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let price = Price::from_cents(12900, CurrencyCode::EUR);
        assert_eq!(price.display(), "€129.00");
    }

    #[test]
    fn test_times_quantity() {
        let price = Price::from_cents(4950, CurrencyCode::EUR);
        let total = price.times(3);
        assert_eq!(total.display(), "€148.50");
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Price::from_cents(1000, CurrencyCode::EUR);
        let b = Price::from_cents(250, CurrencyCode::EUR);
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.amount, Decimal::new(1250, 2));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Price::from_cents(1000, CurrencyCode::EUR);
        let b = Price::from_cents(250, CurrencyCode::USD);
        assert!(a.checked_add(&b).is_none());
    }
}
