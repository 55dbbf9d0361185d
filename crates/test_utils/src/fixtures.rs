//! Test Data Fixtures
//!
//! Pre-built values for the entities the billing tests touch most. All
//! monetary fixtures are in the test currency so suites do not need to
//! thread a currency around.

use chrono::NaiveDate;
use core_kernel::{ClassId, Currency, Money, StudentId, Term};
use rust_decimal_macros::dec;

/// The currency every fixture is denominated in
pub const TEST_CURRENCY: Currency = Currency::KES;

/// Monetary fixtures
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical term's tuition fee
    pub fn tuition_fee() -> Money {
        Money::new(dec!(1000), TEST_CURRENCY)
    }

    /// A typical boarding fee
    pub fn boarding_fee() -> Money {
        Money::new(dec!(450), TEST_CURRENCY)
    }

    /// A payment that only partially covers the tuition fee
    pub fn partial_payment() -> Money {
        Money::new(dec!(400), TEST_CURRENCY)
    }

    /// A small prepayment
    pub fn prepayment() -> Money {
        Money::new(dec!(250), TEST_CURRENCY)
    }

    /// Zero in the test currency
    pub fn zero() -> Money {
        Money::zero(TEST_CURRENCY)
    }
}

/// Identifier fixtures
pub struct IdFixtures;

impl IdFixtures {
    /// A fresh student id
    pub fn student_id() -> StudentId {
        StudentId::new()
    }

    /// A fresh class id
    pub fn class_id() -> ClassId {
        ClassId::new()
    }
}

/// Term and date fixtures
pub struct TermFixtures;

impl TermFixtures {
    /// The term invoices are raised for by default
    pub fn term() -> Term {
        Term::First
    }

    /// The academic year invoices are raised for by default
    pub fn year() -> i32 {
        2026
    }

    /// An issue date early in the term
    pub fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
    }

    /// An issue date `days` after [`TermFixtures::issue_date`]
    pub fn issue_date_plus(days: u64) -> NaiveDate {
        Self::issue_date() + chrono::Days::new(days)
    }
}
