//! Billing domain errors
//!
//! The taxonomy keeps failures distinguishable at the boundary: validation
//! rejects before anything is persisted, not-found and access-denied leave
//! no partial state, consistency errors mean the ledger itself has
//! diverged and must never be papered over, and dependency errors are
//! retryable by the caller.

use core_kernel::{MoneyError, PortError, Role};
use std::fmt;
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Input rejected before any mutation
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Referenced entity does not exist
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// Caller's role does not permit the operation
    #[error("Access denied: {operation} requires the {required} role")]
    AccessDenied {
        operation: String,
        required: Role,
    },

    /// The ledger already diverged from its invariants; reported, never
    /// clamped
    #[error("Ledger inconsistency: {0}")]
    Consistency(String),

    /// A collaborator (store, directory) failed; retries are caller-driven
    #[error("Dependency failure: {0}")]
    Dependency(PortError),
}

impl BillingError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error tied to a field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        BillingError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a not-found error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        BillingError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates an access-denied error for an admin-only operation
    pub fn access_denied(operation: impl Into<String>) -> Self {
        BillingError::AccessDenied {
            operation: operation.into(),
            required: Role::Admin,
        }
    }

    /// Creates a consistency error
    pub fn consistency(message: impl Into<String>) -> Self {
        BillingError::Consistency(message.into())
    }

    /// Returns true for consistency errors
    pub fn is_consistency(&self) -> bool {
        matches!(self, BillingError::Consistency(_))
    }

    /// Returns true for not-found errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::NotFound { .. })
    }

    /// Returns true for validation errors
    pub fn is_validation(&self) -> bool {
        matches!(self, BillingError::Validation { .. })
    }
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => BillingError::NotFound { entity_type, id },
            PortError::Validation { message } => BillingError::validation(message),
            other => BillingError::Dependency(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        // Mixed currencies inside one student's ledger mean the stored
        // records disagree, not that the request was malformed.
        BillingError::Consistency(format!("money arithmetic failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_maps_to_not_found() {
        let err: BillingError = PortError::not_found("Invoice", "abc").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_port_conflict_maps_to_dependency() {
        let err: BillingError = PortError::conflict("stale version").into();
        assert!(matches!(err, BillingError::Dependency(_)));
    }

    #[test]
    fn test_money_error_is_consistency() {
        let err: BillingError =
            MoneyError::CurrencyMismatch("USD".into(), "KES".into()).into();
        assert!(err.is_consistency());
    }
}
