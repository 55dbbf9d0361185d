//! Reversals
//!
//! Undoes a payment or removes an invoice while keeping the ledger
//! consistent. The compensating balance change and the record removal
//! travel in one atomic mutation, so a payment record can never outlive
//! or predecease its financial effect. An undo that would breach an
//! invariant (balance above total fees, credit below zero) is reported as
//! a consistency error — it means the ledger had already diverged — and
//! leaves all committed state untouched.

use chrono::Utc;
use std::sync::Arc;

use core_kernel::{Actor, Currency, InvoiceId, Money, PaymentId, StudentId};

use crate::credit::CreditBalance;
use crate::error::BillingError;
use crate::events::{BillingEvent, EventDispatcher};
use crate::invoice::InvoiceStatus;
use crate::payment::Payment;
use crate::ports::{LedgerMutation, LedgerStore, MAX_COMMIT_ATTEMPTS};
use crate::validation;

/// What a reversal compensated against
#[derive(Debug, Clone)]
pub enum ReversalTarget {
    /// The payment had been applied to an invoice
    Invoice {
        invoice_id: InvoiceId,
        outstanding_balance: Money,
        status: InvoiceStatus,
    },
    /// The payment had been absorbed as credit
    CreditBalance { new_balance: Money },
}

/// Result of reversing a payment
#[derive(Debug, Clone)]
pub struct PaymentReversal {
    pub payment_id: PaymentId,
    pub student_id: StudentId,
    pub amount: Money,
    pub target: ReversalTarget,
}

/// Result of deleting an invoice
#[derive(Debug, Clone)]
pub struct InvoiceDeletion {
    pub invoice_id: InvoiceId,
    pub student_id: StudentId,
    /// Payment records removed together with the invoice
    pub removed_payments: Vec<PaymentId>,
    /// Credit restored from prepayment-applied records
    pub credit_restored: Money,
}

/// Service undoing payments and invoices
pub struct ReversalService {
    store: Arc<dyn LedgerStore>,
    events: EventDispatcher,
    currency: Currency,
}

impl ReversalService {
    /// Creates the service
    pub fn new(store: Arc<dyn LedgerStore>, events: EventDispatcher, currency: Currency) -> Self {
        Self {
            store,
            events,
            currency,
        }
    }

    /// Undoes a payment's financial effect, then deletes its record
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown payment
    /// - `Consistency` when the compensation would breach an invariant
    pub async fn reverse_payment(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
    ) -> Result<PaymentReversal, BillingError> {
        validation::require_admin(actor, "reverse_payment")?;

        let payment = self.store.get_payment(payment_id).await?;
        let student_id = payment.student_id;

        let mut attempt = 0;
        let (reversal, events) = loop {
            attempt += 1;

            let ledger = self.store.snapshot(student_id).await?;
            if ledger.payment(payment_id).is_none() {
                return Err(BillingError::not_found("Payment", payment_id));
            }

            let mut mutation = LedgerMutation::default();
            let mut events = Vec::new();

            let target = match payment.invoice_id {
                Some(invoice_id) => {
                    let mut invoice =
                        ledger.invoice(invoice_id).cloned().ok_or_else(|| {
                            BillingError::consistency(format!(
                                "payment {payment_id} references invoice {invoice_id} which no longer exists"
                            ))
                        })?;

                    invoice.restore_payment(payment_id, payment.amount)?;

                    events.push(BillingEvent::InvoiceUpdated {
                        student_id,
                        invoice_id,
                        new_outstanding_balance: invoice.outstanding_balance,
                        timestamp: Utc::now(),
                    });

                    let target = ReversalTarget::Invoice {
                        invoice_id,
                        outstanding_balance: invoice.outstanding_balance,
                        status: invoice.status,
                    };
                    mutation.upsert_invoices.push(invoice);
                    target
                }
                None => {
                    let mut credit = ledger.credit.clone().ok_or_else(|| {
                        BillingError::consistency(format!(
                            "credit payment {payment_id} has no credit balance to reverse against"
                        ))
                    })?;

                    credit.withdraw(payment.amount)?;

                    events.push(BillingEvent::CreditUpdated {
                        student_id,
                        new_credit_balance: credit.amount,
                        timestamp: Utc::now(),
                    });

                    let target = ReversalTarget::CreditBalance {
                        new_balance: credit.amount,
                    };
                    mutation.upsert_credit = Some(credit);
                    target
                }
            };

            // The record goes only after its effect is undone, and both
            // commit together.
            mutation.delete_payments.push(payment_id);

            events.push(BillingEvent::PaymentReversed {
                student_id,
                payment_id,
                amount: payment.amount,
                timestamp: Utc::now(),
            });

            match self.store.commit(student_id, ledger.version, mutation).await {
                Ok(()) => {
                    break (
                        PaymentReversal {
                            payment_id,
                            student_id,
                            amount: payment.amount,
                            target,
                        },
                        events,
                    );
                }
                Err(err) if err.is_conflict() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        student = %student_id,
                        attempt,
                        "ledger moved during payment reversal, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        tracing::info!(
            student = %student_id,
            payment = %payment_id,
            amount = %payment.amount,
            "payment reversed"
        );

        self.events.dispatch(&events).await;
        Ok(reversal)
    }

    /// Deletes an invoice together with its payment records
    ///
    /// Credit consumed by the invoice at issuance (prepayment-applied
    /// records) is restored to the student's credit balance; records of
    /// money received against the invoice are removed with it. The whole
    /// deletion is one unit of work.
    pub async fn delete_invoice(
        &self,
        actor: &Actor,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceDeletion, BillingError> {
        validation::require_admin(actor, "delete_invoice")?;

        let invoice = self.store.get_invoice(invoice_id).await?;
        let student_id = invoice.student_id;

        let mut attempt = 0;
        let (deletion, events) = loop {
            attempt += 1;

            let ledger = self.store.snapshot(student_id).await?;
            if ledger.invoice(invoice_id).is_none() {
                return Err(BillingError::not_found("Invoice", invoice_id));
            }

            let linked = ledger.payments_for_invoice(invoice_id);
            let mut credit_restored = Money::zero(self.currency);
            for payment in &linked {
                if payment.is_prepayment_applied() {
                    credit_restored = credit_restored.checked_add(&payment.amount)?;
                }
            }

            let mut mutation = LedgerMutation::default();
            let mut events = Vec::new();

            mutation.delete_invoices.push(invoice_id);
            mutation.delete_payments = linked.iter().map(|p| p.id).collect();

            if credit_restored.is_positive() {
                let mut credit = ledger
                    .credit
                    .clone()
                    .unwrap_or_else(|| CreditBalance::new(student_id, self.currency));
                credit.add(credit_restored)?;

                // Prepayment-applied records revert to unallocated credit
                // payments, keeping the balance equal to the sum of its
                // backing records.
                for payment in &linked {
                    if payment.is_prepayment_applied() {
                        mutation.insert_payments.push(Payment::prepayment(
                            student_id,
                            credit.id,
                            payment.amount,
                            payment.method,
                            payment.payment_date,
                        ));
                    }
                }

                events.push(BillingEvent::CreditUpdated {
                    student_id,
                    new_credit_balance: credit.amount,
                    timestamp: Utc::now(),
                });
                mutation.upsert_credit = Some(credit);
            }

            events.push(BillingEvent::InvoiceDeleted {
                student_id,
                invoice_id,
                timestamp: Utc::now(),
            });

            let removed_payments = mutation.delete_payments.clone();
            match self.store.commit(student_id, ledger.version, mutation).await {
                Ok(()) => {
                    break (
                        InvoiceDeletion {
                            invoice_id,
                            student_id,
                            removed_payments,
                            credit_restored,
                        },
                        events,
                    );
                }
                Err(err) if err.is_conflict() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        student = %student_id,
                        attempt,
                        "ledger moved during invoice deletion, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        tracing::info!(
            student = %student_id,
            invoice = %invoice_id,
            removed_payments = deletion.removed_payments.len(),
            credit_restored = %deletion.credit_restored,
            "invoice deleted"
        );

        self.events.dispatch(&events).await;
        Ok(deletion)
    }
}
