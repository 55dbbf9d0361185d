//! Billing DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{Currency, Money, Term};
use domain_billing::{
    AppliedPayment, ClassInvoiceOutcome, FeeItem, Invoice, InvoiceDeletion, InvoiceStatus,
    LedgerTransaction, Payment, PaymentMethod, PaymentOutcome, PaymentReversal, ReversalTarget,
    StudentBalance, StudentInvoiceSummary, TransactionKind,
};

#[derive(Debug, Deserialize)]
pub struct FeeItemRequest {
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl FeeItemRequest {
    /// Converts to the domain fee item in the ledger currency
    pub fn into_domain(self, currency: Currency) -> FeeItem {
        let item = FeeItem::new(self.name, Money::new(self.amount, currency));
        match self.description {
            Some(description) => item.with_description(description),
            None => item,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub student_id: Uuid,
    pub term: Term,
    pub year: i32,
    pub items: Vec<FeeItemRequest>,
    pub issued_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct GenerateClassInvoiceRequest {
    pub class_id: Uuid,
    pub term: Term,
    pub year: i32,
    pub items: Vec<FeeItemRequest>,
    pub issued_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub student_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct FeeItemResponse {
    pub name: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&FeeItem> for FeeItemResponse {
    fn from(item: &FeeItem) -> Self {
        Self {
            name: item.name.clone(),
            amount: item.amount.amount(),
            description: item.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<Uuid>,
    pub term: Term,
    pub year: i32,
    pub items: Vec<FeeItemResponse>,
    pub currency: Currency,
    pub total_fees: Decimal,
    pub outstanding_balance: Decimal,
    pub payments: Vec<Uuid>,
    pub status: InvoiceStatus,
    pub issued_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: *invoice.id.as_uuid(),
            student_id: *invoice.student_id.as_uuid(),
            class_id: invoice.class_id.map(|id| *id.as_uuid()),
            term: invoice.term,
            year: invoice.year,
            items: invoice.items.iter().map(FeeItemResponse::from).collect(),
            currency: invoice.total_fees.currency(),
            total_fees: invoice.total_fees.amount(),
            outstanding_balance: invoice.outstanding_balance.amount(),
            payments: invoice.payments.iter().map(|id| *id.as_uuid()).collect(),
            status: invoice.status,
            issued_date: invoice.issued_date,
            created_at: invoice.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassInvoiceFailureResponse {
    pub student_id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ClassInvoiceResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub failures: Vec<ClassInvoiceFailureResponse>,
}

impl From<&ClassInvoiceOutcome> for ClassInvoiceResponse {
    fn from(outcome: &ClassInvoiceOutcome) -> Self {
        Self {
            invoices: outcome.invoices.iter().map(InvoiceResponse::from).collect(),
            failures: outcome
                .failures
                .iter()
                .map(|f| ClassInvoiceFailureResponse {
                    student_id: *f.student_id.as_uuid(),
                    error: f.error.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppliedPaymentResponse {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub applied: Decimal,
    pub outstanding_balance: Decimal,
    pub status: InvoiceStatus,
}

impl From<&AppliedPayment> for AppliedPaymentResponse {
    fn from(applied: &AppliedPayment) -> Self {
        Self {
            payment_id: *applied.payment_id.as_uuid(),
            invoice_id: *applied.invoice_id.as_uuid(),
            applied: applied.applied.amount(),
            outstanding_balance: applied.outstanding_balance.amount(),
            status: applied.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentOutcomeResponse {
    pub student_id: Uuid,
    pub amount: Decimal,
    pub applied_to_invoices: Vec<AppliedPaymentResponse>,
    pub credited: Decimal,
    pub credit_balance: Decimal,
}

impl From<&PaymentOutcome> for PaymentOutcomeResponse {
    fn from(outcome: &PaymentOutcome) -> Self {
        Self {
            student_id: *outcome.student_id.as_uuid(),
            amount: outcome.amount.amount(),
            applied_to_invoices: outcome
                .applied_to_invoices
                .iter()
                .map(AppliedPaymentResponse::from)
                .collect(),
            credited: outcome.credited.amount(),
            credit_balance: outcome.credit_balance.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_balance_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: Currency,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub reference: String,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: *payment.id.as_uuid(),
            student_id: *payment.student_id.as_uuid(),
            invoice_id: payment.invoice_id.map(|id| *id.as_uuid()),
            credit_balance_id: payment.credit_balance_id.map(|id| *id.as_uuid()),
            amount: payment.amount.amount(),
            currency: payment.amount.currency(),
            payment_date: payment.payment_date,
            method: payment.method,
            reference: payment.reference.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalTargetResponse {
    Invoice {
        invoice_id: Uuid,
        outstanding_balance: Decimal,
        status: InvoiceStatus,
    },
    CreditBalance {
        new_balance: Decimal,
    },
}

#[derive(Debug, Serialize)]
pub struct PaymentReversalResponse {
    pub payment_id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub target: ReversalTargetResponse,
}

impl From<&PaymentReversal> for PaymentReversalResponse {
    fn from(reversal: &PaymentReversal) -> Self {
        let target = match &reversal.target {
            ReversalTarget::Invoice {
                invoice_id,
                outstanding_balance,
                status,
            } => ReversalTargetResponse::Invoice {
                invoice_id: *invoice_id.as_uuid(),
                outstanding_balance: outstanding_balance.amount(),
                status: *status,
            },
            ReversalTarget::CreditBalance { new_balance } => {
                ReversalTargetResponse::CreditBalance {
                    new_balance: new_balance.amount(),
                }
            }
        };

        Self {
            payment_id: *reversal.payment_id.as_uuid(),
            student_id: *reversal.student_id.as_uuid(),
            amount: reversal.amount.amount(),
            target,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceDeletionResponse {
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub removed_payments: Vec<Uuid>,
    pub credit_restored: Decimal,
}

impl From<&InvoiceDeletion> for InvoiceDeletionResponse {
    fn from(deletion: &InvoiceDeletion) -> Self {
        Self {
            invoice_id: *deletion.invoice_id.as_uuid(),
            student_id: *deletion.student_id.as_uuid(),
            removed_payments: deletion
                .removed_payments
                .iter()
                .map(|id| *id.as_uuid())
                .collect(),
            credit_restored: deletion.credit_restored.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentBalanceResponse {
    pub student_id: Uuid,
    pub student_name: String,
    pub outstanding_balance: Decimal,
    pub credit_balance: Decimal,
    pub total_owed: Decimal,
}

impl From<&StudentBalance> for StudentBalanceResponse {
    fn from(balance: &StudentBalance) -> Self {
        Self {
            student_id: *balance.student_id.as_uuid(),
            student_name: balance.student_name.clone(),
            outstanding_balance: balance.outstanding_balance.amount(),
            credit_balance: balance.credit_balance.amount(),
            total_owed: balance.total_owed.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub kind: TransactionKind,
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
}

impl From<&LedgerTransaction> for TransactionResponse {
    fn from(transaction: &LedgerTransaction) -> Self {
        Self {
            kind: transaction.kind,
            id: transaction.id,
            date: transaction.date,
            amount: transaction.amount.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentInvoicesResponse {
    pub student_id: Uuid,
    pub invoices: Vec<InvoiceResponse>,
    pub total_outstanding: Decimal,
}

impl From<&StudentInvoiceSummary> for StudentInvoicesResponse {
    fn from(summary: &StudentInvoiceSummary) -> Self {
        Self {
            student_id: *summary.student_id.as_uuid(),
            invoices: summary.invoices.iter().map(InvoiceResponse::from).collect(),
            total_outstanding: summary.total_outstanding.amount(),
        }
    }
}
