//! Boundary validation
//!
//! Explicit validation functions returning typed errors. Every operation
//! validates its input here before touching the store, so a rejected
//! request never leaves partial state behind.

use core_kernel::{Actor, Currency, Money, Role, Term};

use crate::error::BillingError;
use crate::invoice::FeeItem;

/// Requires the admin role for a billing operation
pub fn require_admin(actor: &Actor, operation: &str) -> Result<(), BillingError> {
    if !actor.has_role(Role::Admin) {
        return Err(BillingError::access_denied(operation));
    }
    Ok(())
}

/// Validates a payment amount
pub fn validate_payment_amount(amount: Money) -> Result<Money, BillingError> {
    if !amount.is_positive() {
        return Err(BillingError::validation_field(
            format!("Payment amount must be positive, got {amount}"),
            "amount",
        ));
    }
    Ok(amount)
}

/// Validates fee items and returns their total
///
/// Items must be non-empty, named, positively priced, and in the ledger's
/// currency; the total must come out positive.
pub fn validate_fee_items(items: &[FeeItem], currency: Currency) -> Result<Money, BillingError> {
    if items.is_empty() {
        return Err(BillingError::validation_field(
            "At least one fee item is required",
            "items",
        ));
    }

    let mut total = Money::zero(currency);
    for (index, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(BillingError::validation_field(
                format!("Fee item {index} is missing a name"),
                "items",
            ));
        }
        if item.amount.currency() != currency {
            return Err(BillingError::validation_field(
                format!(
                    "Fee item '{}' is in {}, expected {}",
                    item.name,
                    item.amount.currency(),
                    currency
                ),
                "items",
            ));
        }
        if !item.amount.is_positive() {
            return Err(BillingError::validation_field(
                format!(
                    "Fee item '{}' must have a positive amount, got {}",
                    item.name, item.amount
                ),
                "items",
            ));
        }
        total = total.checked_add(&item.amount)?;
    }

    if !total.is_positive() {
        return Err(BillingError::validation_field(
            "Total fees must be positive",
            "items",
        ));
    }

    Ok(total)
}

/// Validates an academic year
pub fn validate_year(year: i32) -> Result<i32, BillingError> {
    Term::validate_year(year)
        .map_err(|err| BillingError::validation_field(err.to_string(), "year"))
}
