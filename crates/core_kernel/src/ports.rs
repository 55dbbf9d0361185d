//! Port infrastructure
//!
//! The domain talks to the outside world (storage, the student directory,
//! event delivery) exclusively through port traits. Adapters implement
//! those traits and report failures through the shared [`PortError`], so
//! the domain can classify a failure — missing record, concurrent update,
//! transient outage — without knowing which adapter produced it.

use std::fmt;
use thiserror::Error;

/// Marker trait for all domain ports
///
/// Port traits extend this marker so every adapter is thread-safe and
/// usable from async contexts.
pub trait DomainPort: Send + Sync + 'static {}

/// Failure reported by a port implementation
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity does not exist
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// The adapter rejected the input
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The operation lost a race with a concurrent change, e.g. a stale
    /// ledger version
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The backing system could not be reached
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation did not finish in time
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// The backing system is up but refusing work
    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },

    /// Anything else went wrong inside the adapter
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        PortError::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// A retry may succeed: the failure was in reaching the system, not
    /// in what was asked of it
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::ServiceUnavailable { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PortError::not_found("Invoice", "abc").is_not_found());
        assert!(PortError::conflict("stale version").is_conflict());
        assert!(!PortError::validation("bad amount").is_transient());
    }

    #[test]
    fn test_transient_failures() {
        assert!(PortError::connection("refused").is_transient());
        assert!(PortError::timeout("emit_event", 2000).is_transient());
        assert!(
            PortError::ServiceUnavailable {
                service: "postgres".into()
            }
            .is_transient()
        );
        assert!(!PortError::conflict("lost the race").is_transient());
    }

    #[test]
    fn test_messages_name_the_entity() {
        let err = PortError::not_found("Payment", "PAY-123");
        let text = err.to_string();
        assert!(text.contains("Payment"));
        assert!(text.contains("PAY-123"));
    }
}
