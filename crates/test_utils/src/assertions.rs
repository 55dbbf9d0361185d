//! Assertion helpers for ledger invariants

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceStatus, PaymentOutcome};

/// Asserts two monetary amounts are equal, with a readable failure
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual, expected,
        "expected {expected}, got {actual}"
    );
}

/// Asserts an invoice's internal invariants hold
///
/// The outstanding balance must lie within `0..=total_fees` and the
/// cached status must match what derivation produces.
pub fn assert_invoice_consistent(invoice: &Invoice) {
    assert!(
        !invoice.outstanding_balance.is_negative(),
        "invoice {} has a negative outstanding balance: {}",
        invoice.id,
        invoice.outstanding_balance
    );
    assert!(
        invoice.outstanding_balance.amount() <= invoice.total_fees.amount(),
        "invoice {} owes more than its total: {} > {}",
        invoice.id,
        invoice.outstanding_balance,
        invoice.total_fees
    );
    assert_eq!(
        invoice.status,
        InvoiceStatus::derive(invoice.outstanding_balance, invoice.total_fees),
        "invoice {} carries a stale status",
        invoice.id
    );
}

/// Asserts the conservation law for a payment outcome
///
/// The amounts applied to invoices plus the credited leftover must equal
/// the amount received, exactly.
pub fn assert_conservation(outcome: &PaymentOutcome) {
    let mut applied = Money::zero(outcome.amount.currency());
    for application in &outcome.applied_to_invoices {
        applied = applied + application.applied;
    }
    assert_money_eq(applied + outcome.credited, outcome.amount);
}
