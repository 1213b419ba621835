//! Invoice and payment amounts
//!
//! Amounts are `rust_decimal` values tagged with one of the invoicing
//! currencies. There is no conversion: arithmetic across currencies is an
//! error, and aggregate figures that mix them are computed on raw decimals
//! by the caller.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scale amounts are stored at
const STORAGE_SCALE: u32 = 4;

/// Currencies invoices may be issued in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    RUB,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::USD, Currency::EUR, Currency::RUB];

    /// Digits after the decimal point in a printed amount
    pub fn minor_digits(&self) -> u32 {
        2
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::RUB => "₽",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::RUB => "RUB",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    /// Case-sensitive: `"usd"` is not a currency
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| MoneyError::UnsupportedCurrency(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// An amount in one currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Rounds `amount` to the storage scale
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: Self::stored_amount(amount),
            currency,
        }
    }

    /// `amount` as it will be kept once wrapped in a `Money`
    ///
    /// Sign checks on caller input go through this so that a value which
    /// only looks positive before rounding is still rejected.
    pub fn stored_amount(amount: Decimal) -> Decimal {
        amount.round_dp(STORAGE_SCALE)
    }

    /// From cents, kopecks and the like
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.minor_digits()), currency)
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Rounded to the printed precision, for messages
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.minor_digits()),
            currency: self.currency,
        }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// `self - other` floored at zero; what is still owed after `other` was paid
    pub fn saturating_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        let difference = self.checked_sub(other)?;
        if difference.is_negative() {
            Ok(Money::zero(self.currency))
        } else {
            Ok(difference)
        }
    }

    /// Total of `items`, all of which must be in `currency`
    pub fn sum<'a, I>(currency: Currency, items: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |total, m| total.checked_add(m))
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            })
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.currency.minor_digits() as usize;
        write!(f, "{} {:.digits$}", self.currency.symbol(), self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parsing_is_exact() {
        assert_eq!("RUB".parse::<Currency>(), Ok(Currency::RUB));
        assert_eq!(
            "GBP".parse::<Currency>(),
            Err(MoneyError::UnsupportedCurrency("GBP".to_string()))
        );
        assert!("usd".parse::<Currency>().is_err());
    }

    #[test]
    fn test_mismatch_names_both_currencies() {
        let usd = Money::new(dec!(100), Currency::USD);
        let eur = Money::new(dec!(100), Currency::EUR);
        assert_eq!(
            usd.checked_add(&eur),
            Err(MoneyError::CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::EUR,
            })
        );
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let billed = Money::new(dec!(1000), Currency::USD);
        let paid = Money::new(dec!(400), Currency::USD);
        assert_eq!(billed.saturating_sub(&paid).unwrap().amount(), dec!(600));
        assert!(paid.saturating_sub(&billed).unwrap().is_zero());
    }

    #[test]
    fn test_sub_scale_amounts_store_as_zero() {
        assert!(Money::stored_amount(dec!(0.00001)).is_zero());
        assert_eq!(Money::stored_amount(dec!(0.00006)), dec!(0.0001));
        assert!(!Money::new(dec!(0.00001), Currency::USD).is_positive());
    }

    #[test]
    fn test_sum_of_installments() {
        let items = [
            Money::new(dec!(400), Currency::USD),
            Money::new(dec!(600), Currency::USD),
        ];
        assert_eq!(Money::sum(Currency::USD, items.iter()).unwrap().amount(), dec!(1000));

        let none: [Money; 0] = [];
        assert!(Money::sum(Currency::EUR, none.iter()).unwrap().is_zero());
    }
}
