//! Balance aggregation and transaction history
//!
//! Read-side views over the ledger: per-student balances across the whole
//! directory, the merged payment/invoice history for one student, and the
//! single-student invoice summary. The authoritative balance is always
//! computed from invoices and the credit balance, never read from a
//! stored student field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use core_kernel::{Actor, Currency, Money, StudentId};

use crate::error::BillingError;
use crate::invoice::Invoice;
use crate::ports::{LedgerStore, StudentDirectory};
use crate::validation;

/// One student's aggregate position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentBalance {
    pub student_id: StudentId,
    pub student_name: String,
    /// Sum of outstanding balances across open invoices
    pub outstanding_balance: Money,
    /// Unallocated prepaid funds
    pub credit_balance: Money,
    /// Outstanding minus credit; negative means net prepaid
    pub total_owed: Money,
}

/// Kind of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Invoice,
    Payment,
}

/// One entry in the merged history view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub kind: TransactionKind,
    /// The underlying record's identifier
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub amount: Money,
}

/// One student's invoices with their total outstanding balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInvoiceSummary {
    pub student_id: StudentId,
    pub invoices: Vec<Invoice>,
    pub total_outstanding: Money,
}

/// Read-side reporting over the ledger
pub struct ReportingService {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn StudentDirectory>,
    currency: Currency,
}

impl ReportingService {
    /// Creates the service
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn StudentDirectory>,
        currency: Currency,
    ) -> Self {
        Self {
            store,
            directory,
            currency,
        }
    }

    /// Aggregates every student's outstanding and credit position
    pub async fn student_balances(
        &self,
        actor: &Actor,
    ) -> Result<Vec<StudentBalance>, BillingError> {
        validation::require_admin(actor, "student_balances")?;

        let students = self.directory.list_students().await?;
        let mut balances = Vec::with_capacity(students.len());

        for student in students {
            let ledger = self.store.snapshot(student.id).await?;

            let mut outstanding = Money::zero(self.currency);
            for invoice in ledger.outstanding_invoices() {
                outstanding = outstanding.checked_add(&invoice.outstanding_balance)?;
            }
            let credit = ledger.credit_amount(self.currency);

            balances.push(StudentBalance {
                student_id: student.id,
                student_name: student.full_name(),
                outstanding_balance: outstanding,
                credit_balance: credit,
                total_owed: outstanding.checked_sub(&credit)?,
            });
        }

        Ok(balances)
    }

    /// Returns the merged, date-descending view of a student's payments
    /// and invoices
    pub async fn transaction_history(
        &self,
        actor: &Actor,
        student_id: StudentId,
    ) -> Result<Vec<LedgerTransaction>, BillingError> {
        validation::require_admin(actor, "transaction_history")?;

        self.directory
            .find_student(student_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Student", student_id))?;

        let ledger = self.store.snapshot(student_id).await?;

        let mut transactions: Vec<LedgerTransaction> = Vec::new();
        for payment in &ledger.payments {
            transactions.push(LedgerTransaction {
                kind: TransactionKind::Payment,
                id: *payment.id.as_uuid(),
                date: payment.payment_date,
                amount: payment.amount,
            });
        }
        for invoice in &ledger.invoices {
            transactions.push(LedgerTransaction {
                kind: TransactionKind::Invoice,
                id: *invoice.id.as_uuid(),
                date: issued_at(invoice),
                amount: invoice.total_fees,
            });
        }

        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(transactions)
    }

    /// Fetches one invoice by id
    pub async fn get_invoice(
        &self,
        actor: &Actor,
        invoice_id: core_kernel::InvoiceId,
    ) -> Result<Invoice, BillingError> {
        validation::require_admin(actor, "get_invoice")?;
        Ok(self.store.get_invoice(invoice_id).await?)
    }

    /// Fetches one payment record by id
    pub async fn get_payment(
        &self,
        actor: &Actor,
        payment_id: core_kernel::PaymentId,
    ) -> Result<crate::payment::Payment, BillingError> {
        validation::require_admin(actor, "get_payment")?;
        Ok(self.store.get_payment(payment_id).await?)
    }

    /// Returns a student's invoices and their total outstanding balance
    pub async fn student_invoices(
        &self,
        actor: &Actor,
        student_id: StudentId,
    ) -> Result<StudentInvoiceSummary, BillingError> {
        validation::require_admin(actor, "student_invoices")?;

        self.directory
            .find_student(student_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Student", student_id))?;

        let ledger = self.store.snapshot(student_id).await?;

        let mut total_outstanding = Money::zero(self.currency);
        for invoice in &ledger.invoices {
            total_outstanding = total_outstanding.checked_add(&invoice.outstanding_balance)?;
        }

        Ok(StudentInvoiceSummary {
            student_id,
            invoices: ledger.invoices,
            total_outstanding,
        })
    }
}

/// An invoice's position on the history timeline
fn issued_at(invoice: &Invoice) -> DateTime<Utc> {
    invoice
        .issued_date
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(invoice.created_at)
}
