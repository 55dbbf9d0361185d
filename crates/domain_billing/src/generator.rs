//! Invoice generation
//!
//! Builds invoices from fee items for one student or for every student in
//! a class. Available credit is consumed exactly once per issued invoice;
//! prepayment records backing the consumed credit are converted onto the
//! new invoice so the money stays traceable, without ever being counted
//! twice.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use core_kernel::{Actor, ClassId, Currency, Money, PaymentId, StudentId, Term};

use crate::allocation;
use crate::error::BillingError;
use crate::events::{BillingEvent, EventDispatcher};
use crate::invoice::{FeeItem, Invoice};
use crate::payment::Payment;
use crate::ports::{
    LedgerMutation, LedgerStore, StudentDirectory, StudentLedger, MAX_COMMIT_ATTEMPTS,
};
use crate::validation;

/// Request to invoice a single student
#[derive(Debug, Clone)]
pub struct GenerateInvoice {
    pub student_id: StudentId,
    pub term: Term,
    pub year: i32,
    pub items: Vec<FeeItem>,
    pub issued_date: NaiveDate,
}

/// Request to invoice every student in a class
#[derive(Debug, Clone)]
pub struct GenerateClassInvoice {
    pub class_id: ClassId,
    pub term: Term,
    pub year: i32,
    pub items: Vec<FeeItem>,
    pub issued_date: NaiveDate,
}

/// One student's failure within a class-wide run
#[derive(Debug, Clone)]
pub struct ClassInvoiceFailure {
    pub student_id: StudentId,
    pub error: String,
}

/// Outcome of a class-wide run
///
/// Each student's invoice is its own transaction boundary: a failure is
/// collected here and never rolls back or blocks the other students.
#[derive(Debug, Clone)]
pub struct ClassInvoiceOutcome {
    pub invoices: Vec<Invoice>,
    pub failures: Vec<ClassInvoiceFailure>,
}

/// Service issuing fee invoices
pub struct InvoiceService {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn StudentDirectory>,
    events: EventDispatcher,
    currency: Currency,
}

impl InvoiceService {
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

    /// Issues an invoice for one student
    ///
    /// # Errors
    ///
    /// - `AccessDenied` for non-admin callers
    /// - `Validation` for empty/invalid fee items or an out-of-range year
    /// - `NotFound` for an unknown student
    pub async fn generate_invoice(
        &self,
        actor: &Actor,
        request: GenerateInvoice,
    ) -> Result<Invoice, BillingError> {
        validation::require_admin(actor, "generate_invoice")?;
        let total_fees = validation::validate_fee_items(&request.items, self.currency)?;
        validation::validate_year(request.year)?;

        let student = self
            .directory
            .find_student(request.student_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Student", request.student_id))?;

        let (invoice, events) = self
            .issue_for_student(
                student.id,
                None,
                request.term,
                request.year,
                &request.items,
                total_fees,
                request.issued_date,
            )
            .await?;

        self.events.dispatch(&events).await;
        Ok(invoice)
    }

    /// Issues the same fee items to every student in a class
    ///
    /// Credit is applied independently per student. Failures are collected
    /// in the outcome rather than aborting the batch.
    pub async fn generate_class_invoice(
        &self,
        actor: &Actor,
        request: GenerateClassInvoice,
    ) -> Result<ClassInvoiceOutcome, BillingError> {
        validation::require_admin(actor, "generate_class_invoice")?;
        let total_fees = validation::validate_fee_items(&request.items, self.currency)?;
        validation::validate_year(request.year)?;

        let students = self
            .directory
            .find_students_in_class(request.class_id)
            .await?;
        if students.is_empty() {
            return Err(BillingError::not_found("Class roster", request.class_id));
        }

        let mut outcome = ClassInvoiceOutcome {
            invoices: Vec::new(),
            failures: Vec::new(),
        };
        let mut all_events = Vec::new();

        for student in &students {
            match self
                .issue_for_student(
                    student.id,
                    Some(request.class_id),
                    request.term,
                    request.year,
                    &request.items,
                    total_fees,
                    request.issued_date,
                )
                .await
            {
                Ok((invoice, events)) => {
                    outcome.invoices.push(invoice);
                    all_events.extend(events);
                }
                Err(err) => {
                    tracing::warn!(
                        student = %student.id,
                        class = %request.class_id,
                        error = %err,
                        "class invoice generation failed for student"
                    );
                    outcome.failures.push(ClassInvoiceFailure {
                        student_id: student.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        self.events.dispatch(&all_events).await;
        Ok(outcome)
    }

    /// Issues one invoice inside a per-student transaction boundary
    #[allow(clippy::too_many_arguments)]
    async fn issue_for_student(
        &self,
        student_id: StudentId,
        class_id: Option<ClassId>,
        term: Term,
        year: i32,
        items: &[FeeItem],
        total_fees: Money,
        issued_date: NaiveDate,
    ) -> Result<(Invoice, Vec<BillingEvent>), BillingError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let ledger = self.store.snapshot(student_id).await?;
            let credit_before = ledger.credit_amount(self.currency);
            let application = allocation::apply_credit(total_fees, credit_before)?;

            let mut invoice = Invoice::issue(
                student_id,
                class_id,
                term,
                year,
                items.to_vec(),
                total_fees,
                application.outstanding_balance,
                issued_date,
            );

            let mut mutation = LedgerMutation::default();
            let mut events = Vec::new();

            if application.credit_consumed.is_positive() {
                let mut credit = ledger.credit.clone().ok_or_else(|| {
                    BillingError::consistency(format!(
                        "credit of {credit_before} reported for student {student_id} but no balance record exists"
                    ))
                })?;
                credit.withdraw(application.credit_consumed)?;

                let conversion =
                    convert_prepayments(&ledger, &mut invoice, application.credit_consumed)?;
                mutation.insert_payments = conversion.inserts;
                mutation.update_payments = conversion.updates;
                mutation.delete_payments = conversion.deletes;
                mutation.upsert_credit = Some(credit.clone());

                events.push(BillingEvent::CreditUpdated {
                    student_id,
                    new_credit_balance: credit.amount,
                    timestamp: Utc::now(),
                });
            }

            mutation.upsert_invoices.push(invoice.clone());
            events.push(BillingEvent::InvoiceIssued {
                student_id,
                invoice_id: invoice.id,
                total_fees: invoice.total_fees,
                outstanding_balance: invoice.outstanding_balance,
                timestamp: Utc::now(),
            });

            match self.store.commit(student_id, ledger.version, mutation).await {
                Ok(()) => {
                    tracing::info!(
                        student = %student_id,
                        invoice = %invoice.id,
                        total = %invoice.total_fees,
                        outstanding = %invoice.outstanding_balance,
                        "invoice issued"
                    );
                    return Ok((invoice, events));
                }
                Err(err) if err.is_conflict() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        student = %student_id,
                        attempt,
                        "ledger moved during invoice issue, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

struct PrepaymentConversion {
    inserts: Vec<Payment>,
    updates: Vec<Payment>,
    deletes: Vec<PaymentId>,
}

/// Converts unallocated prepayment records onto a new invoice
///
/// Walks the records oldest-first, linking up to the credit actually
/// consumed. A fully consumed record is replaced by its invoice-linked
/// counterpart; a partially consumed one is reduced in place so later
/// invoices never recount it.
fn convert_prepayments(
    ledger: &StudentLedger,
    invoice: &mut Invoice,
    consumed: Money,
) -> Result<PrepaymentConversion, BillingError> {
    let mut remaining = consumed;
    let mut conversion = PrepaymentConversion {
        inserts: Vec::new(),
        updates: Vec::new(),
        deletes: Vec::new(),
    };

    for prepayment in ledger.unallocated_prepayments() {
        if !remaining.is_positive() {
            break;
        }

        let take = prepayment.amount.min_with(&remaining)?;
        let applied = Payment::prepayment_applied(
            invoice.student_id,
            invoice.id,
            prepayment.credit_balance_id,
            take,
            prepayment.method,
            prepayment.payment_date,
        );
        invoice.link_payment(applied.id);
        conversion.inserts.push(applied);

        if take == prepayment.amount {
            conversion.deletes.push(prepayment.id);
        } else {
            let mut reduced = (*prepayment).clone();
            reduced.amount = reduced.amount.checked_sub(&take)?;
            conversion.updates.push(reduced);
        }

        remaining = remaining.checked_sub(&take)?;
    }

    if remaining.is_positive() {
        tracing::warn!(
            student = %invoice.student_id,
            unmatched = %remaining,
            "credit balance exceeds unallocated prepayment records"
        );
    }

    Ok(conversion)
}
