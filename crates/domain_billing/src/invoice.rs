//! Invoice management
//!
//! A fee invoice for one student and term. The outstanding balance is only
//! mutated through [`Invoice::apply_payment`] (payment processor) and
//! [`Invoice::restore_payment`] (reversal manager); the status is derived
//! from the balance on every mutation and never drifts on its own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, InvoiceId, Money, PaymentId, StudentId, Term};

use crate::error::BillingError;

/// A single line of a fee invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeItem {
    /// Fee name (e.g. "Tuition", "Boarding")
    pub name: String,
    /// Fee amount
    pub amount: Money,
    /// Optional description
    pub description: Option<String>,
}

impl FeeItem {
    /// Creates a new fee item
    pub fn new(name: impl Into<String>, amount: Money) -> Self {
        Self {
            name: name.into(),
            amount,
            description: None,
        }
    }

    /// Adds a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Invoice settlement status
///
/// Serialized in the record form used throughout the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    #[serde(rename = "Unpaid")]
    Unpaid,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    #[serde(rename = "Paid")]
    Paid,
}

impl InvoiceStatus {
    /// Derives the status from the balance pair
    ///
    /// Pure function: `0 -> Paid`, `== total -> Unpaid`, anything in
    /// between is `PartiallyPaid`.
    pub fn derive(outstanding_balance: Money, total_fees: Money) -> Self {
        if outstanding_balance.is_zero() {
            InvoiceStatus::Paid
        } else if outstanding_balance == total_fees {
            InvoiceStatus::Unpaid
        } else {
            InvoiceStatus::PartiallyPaid
        }
    }
}

/// A fee invoice for a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Student being billed
    pub student_id: StudentId,
    /// Class the invoice was raised against, for class-wide runs
    pub class_id: Option<ClassId>,
    /// Academic term
    pub term: Term,
    /// Academic year
    pub year: i32,
    /// Fee items
    pub items: Vec<FeeItem>,
    /// Sum of item amounts
    pub total_fees: Money,
    /// Unpaid portion, always within `0..=total_fees`
    pub outstanding_balance: Money,
    /// Payments applied to this invoice
    pub payments: Vec<PaymentId>,
    /// Derived settlement status
    pub status: InvoiceStatus,
    /// Date the invoice was issued
    pub issued_date: NaiveDate,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Issues a new invoice
    ///
    /// `total_fees` is the validated sum of `items`; `outstanding_balance`
    /// is what remains after any credit was applied at issuance.
    pub fn issue(
        student_id: StudentId,
        class_id: Option<ClassId>,
        term: Term,
        year: i32,
        items: Vec<FeeItem>,
        total_fees: Money,
        outstanding_balance: Money,
        issued_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: InvoiceId::new(),
            student_id,
            class_id,
            term,
            year,
            items,
            total_fees,
            outstanding_balance,
            payments: Vec::new(),
            status: InvoiceStatus::derive(outstanding_balance, total_fees),
            issued_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true while any amount remains unpaid
    pub fn is_outstanding(&self) -> bool {
        self.outstanding_balance.is_positive()
    }

    /// Applies a payment to the invoice
    ///
    /// Decrements the outstanding balance, records the payment id, and
    /// re-derives the status.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the amount is not positive or would
    /// drive the balance below zero — the allocation engine never produces
    /// such an amount, so hitting this means the ledger diverged.
    pub fn apply_payment(
        &mut self,
        payment_id: PaymentId,
        amount: Money,
    ) -> Result<(), BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::consistency(format!(
                "applied amount {amount} on invoice {} is not positive",
                self.id
            )));
        }

        let remaining = self.outstanding_balance.checked_sub(&amount)?;
        if remaining.is_negative() {
            return Err(BillingError::consistency(format!(
                "applying {amount} to invoice {} would drive its balance below zero (outstanding {})",
                self.id, self.outstanding_balance
            )));
        }

        self.outstanding_balance = remaining;
        self.payments.push(payment_id);
        self.touch();
        Ok(())
    }

    /// Undoes a previously applied payment
    ///
    /// Increments the outstanding balance and removes the payment id.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the restored balance would exceed
    /// the total fees, or if the payment was never recorded on this
    /// invoice. Neither case is clamped.
    pub fn restore_payment(
        &mut self,
        payment_id: PaymentId,
        amount: Money,
    ) -> Result<(), BillingError> {
        let restored = self.outstanding_balance.checked_add(&amount)?;
        if restored.amount() > self.total_fees.amount() {
            return Err(BillingError::consistency(format!(
                "restoring {amount} on invoice {} would exceed its total fees ({} > {})",
                self.id, restored, self.total_fees
            )));
        }

        let position = self
            .payments
            .iter()
            .position(|id| *id == payment_id)
            .ok_or_else(|| {
                BillingError::consistency(format!(
                    "payment {payment_id} is not recorded on invoice {}",
                    self.id
                ))
            })?;

        self.payments.remove(position);
        self.outstanding_balance = restored;
        self.touch();
        Ok(())
    }

    /// Records an externally created payment link without touching the
    /// balance (used when converting prepayments at issuance, where the
    /// credit was already applied)
    pub fn link_payment(&mut self, payment_id: PaymentId) {
        self.payments.push(payment_id);
        self.touch();
    }

    fn touch(&mut self) {
        self.status = InvoiceStatus::derive(self.outstanding_balance, self.total_fees);
        self.updated_at = Utc::now();
    }
}
