//! Payment records
//!
//! One incoming payment transaction can produce several records: one per
//! invoice it settles (in part or full) and one for any leftover absorbed
//! into the credit balance. A record with no `invoice_id` is a credit
//! payment (prepayment); a record carrying both references is a prepayment
//! that was later applied to an invoice at issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CreditBalanceId, InvoiceId, Money, PaymentId, StudentId};

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Cash")]
    Cash,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "Credit")]
    Credit,
    #[serde(rename = "Mobile Money")]
    MobileMoney,
}

/// Reference strings stamped on payment records
pub mod references {
    pub const INVOICE_PAYMENT: &str = "Invoice Payment";
    pub const CREDIT_PAYMENT: &str = "Credit Payment";
    pub const PREPAYMENT_APPLIED: &str = "Prepayment Applied";
}

/// A payment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Student the money was received for
    pub student_id: StudentId,
    /// Invoice the amount was applied to, if any
    pub invoice_id: Option<InvoiceId>,
    /// Credit balance the amount came from or went to, if any
    pub credit_balance_id: Option<CreditBalanceId>,
    /// Amount, always positive
    pub amount: Money,
    /// When the money was received
    pub payment_date: DateTime<Utc>,
    /// How the money was received
    pub method: PaymentMethod,
    /// Reference text
    pub reference: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a record for an amount applied to an invoice
    pub fn for_invoice(
        student_id: StudentId,
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        payment_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            student_id,
            invoice_id: Some(invoice_id),
            credit_balance_id: None,
            amount,
            payment_date,
            method,
            reference: references::INVOICE_PAYMENT.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Creates a record for an amount absorbed into the credit balance
    pub fn prepayment(
        student_id: StudentId,
        credit_balance_id: CreditBalanceId,
        amount: Money,
        method: PaymentMethod,
        payment_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            student_id,
            invoice_id: None,
            credit_balance_id: Some(credit_balance_id),
            amount,
            payment_date,
            method,
            reference: references::CREDIT_PAYMENT.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Creates a record for credit consumed by a newly issued invoice
    ///
    /// Keeps both references so the money stays traceable from the
    /// original prepayment through to the invoice it settled.
    pub fn prepayment_applied(
        student_id: StudentId,
        invoice_id: InvoiceId,
        credit_balance_id: Option<CreditBalanceId>,
        amount: Money,
        method: PaymentMethod,
        payment_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            student_id,
            invoice_id: Some(invoice_id),
            credit_balance_id,
            amount,
            payment_date,
            method,
            reference: references::PREPAYMENT_APPLIED.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Overrides the reference text
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// True for prepayments not yet tied to an invoice
    pub fn is_credit_payment(&self) -> bool {
        self.invoice_id.is_none()
    }

    /// True for prepayments that were applied to an invoice at issuance
    pub fn is_prepayment_applied(&self) -> bool {
        self.invoice_id.is_some() && self.credit_balance_id.is_some()
    }
}
