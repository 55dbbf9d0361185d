//! Credit (prepayment) balances
//!
//! Funds received for a student that are not yet allocated to any invoice.
//! The amount never goes negative: consumption takes at most what is
//! there, and an exact withdrawal that would overdraw is a consistency
//! error, not a clamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CreditBalanceId, Currency, Money, StudentId};

use crate::error::BillingError;

/// A student's prepaid funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditBalance {
    /// Unique identifier
    pub id: CreditBalanceId,
    /// Owning student (one balance per student)
    pub student_id: StudentId,
    /// Prepaid amount, never negative
    pub amount: Money,
    /// Last mutation timestamp
    pub last_updated: DateTime<Utc>,
}

impl CreditBalance {
    /// Creates an empty balance for a student
    pub fn new(student_id: StudentId, currency: Currency) -> Self {
        Self {
            id: CreditBalanceId::new(),
            student_id,
            amount: Money::zero(currency),
            last_updated: Utc::now(),
        }
    }

    /// Adds prepaid funds
    pub fn add(&mut self, amount: Money) -> Result<(), BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::consistency(format!(
                "credit top-up for student {} must be positive, got {amount}",
                self.student_id
            )));
        }
        self.amount = self.amount.checked_add(&amount)?;
        self.last_updated = Utc::now();
        Ok(())
    }

    /// Consumes up to `requested`, returning what was actually taken
    ///
    /// Used when a new invoice absorbs available credit: the balance can
    /// cover the fees fully, partially, or not at all.
    pub fn consume(&mut self, requested: Money) -> Result<Money, BillingError> {
        let consumed = self.amount.min_with(&requested)?;
        self.amount = self.amount.checked_sub(&consumed)?;
        self.last_updated = Utc::now();
        Ok(consumed)
    }

    /// Withdraws an exact amount
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the balance cannot cover the
    /// amount — reversing a credit payment that the balance no longer
    /// holds means the ledger diverged.
    pub fn withdraw(&mut self, amount: Money) -> Result<(), BillingError> {
        let remaining = self.amount.checked_sub(&amount)?;
        if remaining.is_negative() {
            return Err(BillingError::consistency(format!(
                "withdrawing {amount} would drive student {}'s credit balance below zero (held {})",
                self.student_id, self.amount
            )));
        }
        self.amount = remaining;
        self.last_updated = Utc::now();
        Ok(())
    }
}
