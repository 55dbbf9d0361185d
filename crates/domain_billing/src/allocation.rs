//! Payment allocation engine
//!
//! Pure settlement logic: deciding how an incoming amount is spread across
//! outstanding invoices (oldest debt first) and how available credit is
//! consumed when a new invoice is issued. The engine performs no I/O and
//! operates only on the values handed to it, which keeps it independently
//! testable.
//!
//! Conservation law: for any plan produced by [`allocate`], the sum of the
//! per-invoice applied amounts plus the leftover credit equals the payment
//! amount exactly.

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, InvoiceId, Money};

use crate::error::BillingError;

/// An invoice's settlement view as the engine sees it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutstandingInvoice {
    /// Invoice identifier
    pub invoice_id: InvoiceId,
    /// Unpaid portion
    pub outstanding_balance: Money,
}

/// An amount applied to one invoice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAllocation {
    /// Invoice identifier
    pub invoice_id: InvoiceId,
    /// Amount applied
    pub applied: Money,
}

/// The result of distributing a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Per-invoice applications, in settlement order
    pub allocations: Vec<InvoiceAllocation>,
    /// Amount left after all invoices were settled, to be credited
    pub leftover_credit: Money,
}

impl AllocationPlan {
    /// Sums the applied amounts
    pub fn total_applied(&self, currency: Currency) -> Money {
        self.allocations
            .iter()
            .fold(Money::zero(currency), |acc, a| acc + a.applied)
    }
}

/// Distributes a payment across outstanding invoices
///
/// Invoices must be passed oldest-issued-first; settlement walks them in
/// order, applying `min(remaining, outstanding)` to each until the amount
/// is exhausted. Whatever survives every invoice becomes leftover credit.
/// With no outstanding invoices the entire amount is leftover.
///
/// # Errors
///
/// Returns a validation error for a non-positive amount (callers reject
/// these at the boundary, so the engine never has to reason about them).
pub fn allocate(
    payment_amount: Money,
    outstanding_invoices: &[OutstandingInvoice],
) -> Result<AllocationPlan, BillingError> {
    if !payment_amount.is_positive() {
        return Err(BillingError::validation_field(
            format!("Payment amount must be positive, got {payment_amount}"),
            "amount",
        ));
    }

    let mut remaining = payment_amount;
    let mut allocations = Vec::new();

    for invoice in outstanding_invoices {
        if !remaining.is_positive() {
            break;
        }
        if !invoice.outstanding_balance.is_positive() {
            continue;
        }

        let applied = remaining.min_with(&invoice.outstanding_balance)?;
        remaining = remaining.checked_sub(&applied)?;
        allocations.push(InvoiceAllocation {
            invoice_id: invoice.invoice_id,
            applied,
        });
    }

    Ok(AllocationPlan {
        allocations,
        leftover_credit: remaining,
    })
}

/// The result of applying credit to a newly issued invoice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    /// What remains to be paid on the invoice
    pub outstanding_balance: Money,
    /// How much credit the invoice absorbed
    pub credit_consumed: Money,
}

/// Consumes available credit against a new invoice's total fees
///
/// Called once and exactly once per issued invoice. If the credit covers
/// the fees the invoice starts fully paid; otherwise the whole credit is
/// absorbed and the rest stays outstanding.
pub fn apply_credit(
    total_fees: Money,
    existing_credit: Money,
) -> Result<CreditApplication, BillingError> {
    let credit_consumed = existing_credit.min_with(&total_fees)?;
    let outstanding_balance = total_fees.checked_sub(&credit_consumed)?;

    Ok(CreditApplication {
        outstanding_balance,
        credit_consumed,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn invoices_strategy() -> impl Strategy<Value = Vec<OutstandingInvoice>> {
        proptest::collection::vec(1i64..5_000_000i64, 0..12).prop_map(|balances| {
            balances
                .into_iter()
                .map(|minor| OutstandingInvoice {
                    invoice_id: InvoiceId::new(),
                    outstanding_balance: Money::from_minor(minor, Currency::KES),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn conservation_law_holds(
            amount_minor in 1i64..10_000_000i64,
            invoices in invoices_strategy()
        ) {
            let amount = Money::from_minor(amount_minor, Currency::KES);
            let plan = allocate(amount, &invoices).unwrap();

            let total = plan.total_applied(Currency::KES) + plan.leftover_credit;
            prop_assert_eq!(total, amount);
        }

        #[test]
        fn no_allocation_exceeds_its_invoice(
            amount_minor in 1i64..10_000_000i64,
            invoices in invoices_strategy()
        ) {
            let amount = Money::from_minor(amount_minor, Currency::KES);
            let plan = allocate(amount, &invoices).unwrap();

            for allocation in &plan.allocations {
                let invoice = invoices
                    .iter()
                    .find(|i| i.invoice_id == allocation.invoice_id)
                    .unwrap();
                prop_assert!(allocation.applied.amount() <= invoice.outstanding_balance.amount());
                prop_assert!(allocation.applied.is_positive());
            }
        }

        #[test]
        fn leftover_only_after_all_invoices_settled(
            amount_minor in 1i64..10_000_000i64,
            invoices in invoices_strategy()
        ) {
            let amount = Money::from_minor(amount_minor, Currency::KES);
            let plan = allocate(amount, &invoices).unwrap();

            if plan.leftover_credit.is_positive() {
                let applied: Vec<_> = plan.allocations.iter().map(|a| a.invoice_id).collect();
                for invoice in &invoices {
                    if invoice.outstanding_balance.is_positive() {
                        let fully = plan
                            .allocations
                            .iter()
                            .find(|a| a.invoice_id == invoice.invoice_id)
                            .map(|a| a.applied == invoice.outstanding_balance)
                            .unwrap_or(false);
                        prop_assert!(
                            fully,
                            "invoice {:?} not fully settled despite leftover (applied to {:?})",
                            invoice.invoice_id,
                            applied
                        );
                    }
                }
            }
        }

        #[test]
        fn credit_application_conserves_fees(
            fees_minor in 1i64..10_000_000i64,
            credit_minor in 0i64..10_000_000i64
        ) {
            let fees = Money::from_minor(fees_minor, Currency::KES);
            let credit = Money::from_minor(credit_minor, Currency::KES);

            let application = apply_credit(fees, credit).unwrap();
            prop_assert_eq!(
                application.outstanding_balance + application.credit_consumed,
                fees
            );
            prop_assert!(!application.outstanding_balance.is_negative());
            prop_assert!(application.credit_consumed.amount() <= credit.amount());
        }
    }
}
