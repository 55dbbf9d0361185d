//! Money types with precise decimal arithmetic
//!
//! Every amount in the ledger is a [`Money`]: a `rust_decimal` value tied
//! to its currency. Settlement maths must land on exact zeros — a fee
//! paid off in full is `Paid`, not `0.000000001` away from it — so
//! floating point never appears anywhere.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Errors from money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// Currency codes (ISO 4217) the billing system is deployed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    KES,
    TZS,
    UGX,
    NGN,
    GHS,
    ZAR,
    INR,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::KES => "KES",
            Currency::TZS => "TZS",
            Currency::UGX => "UGX",
            Currency::NGN => "NGN",
            Currency::GHS => "GHS",
            Currency::ZAR => "ZAR",
            Currency::INR => "INR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::KES => "KSh",
            Currency::TZS => "TSh",
            Currency::UGX => "USh",
            Currency::NGN => "₦",
            Currency::GHS => "GH₵",
            Currency::ZAR => "R",
            Currency::INR => "₹",
        }
    }

    /// Minor-unit digits for the currency
    pub fn decimal_places(&self) -> u32 {
        // Ugandan shillings have no minor unit
        match self {
            Currency::UGX => 0,
            _ => 2,
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "KES" => Ok(Currency::KES),
            "TZS" => Ok(Currency::TZS),
            "UGX" => Ok(Currency::UGX),
            "NGN" => Ok(Currency::NGN),
            "GHS" => Ok(Currency::GHS),
            "ZAR" => Ok(Currency::ZAR),
            "INR" => Ok(Currency::INR),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount of money in a specific currency
///
/// Internally held at four decimal places so repeated allocation
/// arithmetic never loses a sub-cent. Mixed-currency arithmetic is
/// rejected; there is no implicit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    /// Builds an amount from minor units (cents, and whole shillings for
    /// zero-decimal currencies)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        let scale = Decimal::new(10_i64.pow(currency.decimal_places()), 0);
        Self::new(Decimal::new(minor_units, 0) / scale, currency)
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
        !self.amount.is_zero() && self.amount.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.amount.is_zero() && self.amount.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    /// Rounds to the currency's minor-unit precision
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    fn same_currency_as(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency_as(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency_as(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// The smaller of two same-currency amounts
    ///
    /// Settlement leans on this: what lands on an invoice is the minimum
    /// of what remains of the payment and what remains outstanding.
    pub fn min_with(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency_as(other)?;
        Ok(if self.amount <= other.amount {
            *self
        } else {
            *other
        })
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other)
            .expect("Currency mismatch in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places() as usize;
        write!(f, "{} {:.dp$}", self.currency.symbol(), self.amount, dp = dp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_keeps_value_and_currency() {
        let m = Money::new(dec!(250.50), Currency::KES);
        assert_eq!(m.amount(), dec!(250.50));
        assert_eq!(m.currency(), Currency::KES);
    }

    #[test]
    fn test_minor_units_respect_decimal_places() {
        assert_eq!(Money::from_minor(10050, Currency::USD).amount(), dec!(100.50));

        // UGX has no minor unit
        assert_eq!(Money::from_minor(5000, Currency::UGX).amount(), dec!(5000));
    }

    #[test]
    fn test_add_and_sub() {
        let a = Money::new(dec!(1000.00), Currency::USD);
        let b = Money::new(dec!(400.00), Currency::USD);

        assert_eq!((a + b).amount(), dec!(1400.00));
        assert_eq!((a - b).amount(), dec!(600.00));
    }

    #[test]
    fn test_mixed_currencies_rejected() {
        let usd = Money::new(dec!(100.00), Currency::USD);
        let kes = Money::new(dec!(100.00), Currency::KES);

        assert!(matches!(
            usd.checked_add(&kes),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
        assert!(usd.min_with(&kes).is_err());
    }

    #[test]
    fn test_min_with_picks_the_smaller_side() {
        let remaining = Money::new(dec!(400.00), Currency::USD);
        let outstanding = Money::new(dec!(1000.00), Currency::USD);

        assert_eq!(remaining.min_with(&outstanding).unwrap(), remaining);
        assert_eq!(outstanding.min_with(&remaining).unwrap(), remaining);
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Money::new(dec!(-10.00), Currency::USD).is_negative());
        assert!(Money::new(dec!(10.00), Currency::USD).is_positive());

        let zero = Money::zero(Currency::USD);
        assert!(zero.is_zero());
        assert!(!zero.is_negative());
        assert!(!zero.is_positive());
    }

    #[test]
    fn test_currency_codes_parse_case_insensitively() {
        assert_eq!("kes".parse::<Currency>().unwrap(), Currency::KES);
        assert!("XXX".parse::<Currency>().is_err());
    }
}
