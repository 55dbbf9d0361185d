//! Payment processing
//!
//! Records an incoming payment, settles outstanding invoices oldest-first
//! through the allocation engine, and absorbs any leftover into the
//! student's credit balance. All records and balance changes for one
//! payment commit as a single atomic mutation.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use core_kernel::{Actor, Currency, InvoiceId, Money, PaymentId, StudentId};

use crate::allocation::{self, OutstandingInvoice};
use crate::credit::CreditBalance;
use crate::error::BillingError;
use crate::events::{BillingEvent, EventDispatcher};
use crate::invoice::InvoiceStatus;
use crate::payment::{Payment, PaymentMethod};
use crate::ports::{LedgerMutation, LedgerStore, StudentDirectory, MAX_COMMIT_ATTEMPTS};
use crate::validation;

/// Request to record a payment
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub student_id: StudentId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Defaults to now when omitted
    pub payment_date: Option<DateTime<Utc>>,
}

/// One invoice touched by a payment
#[derive(Debug, Clone)]
pub struct AppliedPayment {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub applied: Money,
    pub outstanding_balance: Money,
    pub status: InvoiceStatus,
}

/// Result of recording a payment
///
/// The applied amounts plus `credited` always add up to `amount`.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub student_id: StudentId,
    pub amount: Money,
    pub applied_to_invoices: Vec<AppliedPayment>,
    pub credited: Money,
    pub credit_balance: Money,
}

/// Service recording incoming payments
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn StudentDirectory>,
    events: EventDispatcher,
    currency: Currency,
}

impl PaymentService {
    /// Creates the service
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn StudentDirectory>,
        events: EventDispatcher,
        currency: Currency,
    ) -> Self {
        Self {
            store,
            directory,
            events,
            currency,
        }
    }

    /// Records a payment and applies it to the student's ledger
    ///
    /// # Errors
    ///
    /// - `AccessDenied` for non-admin callers
    /// - `Validation` for a non-positive amount
    /// - `NotFound` for an unknown student
    pub async fn record_payment(
        &self,
        actor: &Actor,
        request: RecordPayment,
    ) -> Result<PaymentOutcome, BillingError> {
        validation::require_admin(actor, "record_payment")?;
        validation::validate_payment_amount(request.amount)?;

        self.directory
            .find_student(request.student_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Student", request.student_id))?;

        let payment_date = request.payment_date.unwrap_or_else(Utc::now);
        let student_id = request.student_id;

        let mut attempt = 0;
        let (outcome, events) = loop {
            attempt += 1;

            let ledger = self.store.snapshot(student_id).await?;
            let outstanding: Vec<OutstandingInvoice> = ledger
                .outstanding_invoices()
                .iter()
                .map(|i| OutstandingInvoice {
                    invoice_id: i.id,
                    outstanding_balance: i.outstanding_balance,
                })
                .collect();

            let plan = allocation::allocate(request.amount, &outstanding)?;

            let mut mutation = LedgerMutation::default();
            let mut events = Vec::new();
            let mut applied_to_invoices = Vec::new();

            for allocation in &plan.allocations {
                let mut invoice = ledger
                    .invoice(allocation.invoice_id)
                    .cloned()
                    .ok_or_else(|| {
                        BillingError::consistency(format!(
                            "allocation targets invoice {} missing from the snapshot",
                            allocation.invoice_id
                        ))
                    })?;

                let payment = Payment::for_invoice(
                    student_id,
                    invoice.id,
                    allocation.applied,
                    request.method,
                    payment_date,
                );
                invoice.apply_payment(payment.id, allocation.applied)?;

                events.push(BillingEvent::InvoiceUpdated {
                    student_id,
                    invoice_id: invoice.id,
                    new_outstanding_balance: invoice.outstanding_balance,
                    timestamp: Utc::now(),
                });
                applied_to_invoices.push(AppliedPayment {
                    payment_id: payment.id,
                    invoice_id: invoice.id,
                    applied: allocation.applied,
                    outstanding_balance: invoice.outstanding_balance,
                    status: invoice.status,
                });

                mutation.insert_payments.push(payment);
                mutation.upsert_invoices.push(invoice);
            }

            let mut credit_balance = ledger.credit_amount(self.currency);
            if plan.leftover_credit.is_positive() {
                let mut credit = ledger
                    .credit
                    .clone()
                    .unwrap_or_else(|| CreditBalance::new(student_id, self.currency));
                credit.add(plan.leftover_credit)?;
                credit_balance = credit.amount;

                let payment = Payment::prepayment(
                    student_id,
                    credit.id,
                    plan.leftover_credit,
                    request.method,
                    payment_date,
                );
                mutation.insert_payments.push(payment);
                mutation.upsert_credit = Some(credit.clone());

                events.push(BillingEvent::CreditUpdated {
                    student_id,
                    new_credit_balance: credit.amount,
                    timestamp: Utc::now(),
                });
            }

            events.push(BillingEvent::PaymentReceived {
                student_id,
                amount: request.amount,
                method: request.method,
                timestamp: Utc::now(),
            });

            match self.store.commit(student_id, ledger.version, mutation).await {
                Ok(()) => {
                    break (
                        PaymentOutcome {
                            student_id,
                            amount: request.amount,
                            applied_to_invoices,
                            credited: plan.leftover_credit,
                            credit_balance,
                        },
                        events,
                    );
                }
                Err(err) if err.is_conflict() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        student = %student_id,
                        attempt,
                        "ledger moved during payment application, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        tracing::info!(
            student = %student_id,
            amount = %request.amount,
            invoices = outcome.applied_to_invoices.len(),
            credited = %outcome.credited,
            "payment recorded"
        );

        self.events.dispatch(&events).await;
        Ok(outcome)
    }
}
