//! Domain events for the billing ledger
//!
//! Services return the events a mutation produced as plain data; the
//! [`EventDispatcher`] delivers them to the configured sink after the
//! commit. Delivery is best-effort with a bounded timeout — a slow or
//! failing sink is logged and never unwinds a committed ledger mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{InvoiceId, Money, PaymentId, StudentId};

use crate::payment::PaymentMethod;
use crate::ports::EventSink;

/// Events emitted by the billing ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BillingEvent {
    /// A new invoice was issued
    InvoiceIssued {
        student_id: StudentId,
        invoice_id: InvoiceId,
        total_fees: Money,
        outstanding_balance: Money,
        timestamp: DateTime<Utc>,
    },

    /// An invoice's outstanding balance changed
    InvoiceUpdated {
        student_id: StudentId,
        invoice_id: InvoiceId,
        new_outstanding_balance: Money,
        timestamp: DateTime<Utc>,
    },

    /// A student's credit balance changed
    CreditUpdated {
        student_id: StudentId,
        new_credit_balance: Money,
        timestamp: DateTime<Utc>,
    },

    /// A payment transaction was received and applied
    PaymentReceived {
        student_id: StudentId,
        amount: Money,
        method: PaymentMethod,
        timestamp: DateTime<Utc>,
    },

    /// A payment's financial effect was undone
    PaymentReversed {
        student_id: StudentId,
        payment_id: PaymentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    /// An invoice and its payment records were removed
    InvoiceDeleted {
        student_id: StudentId,
        invoice_id: InvoiceId,
        timestamp: DateTime<Utc>,
    },
}

impl BillingEvent {
    /// Returns the student this event concerns
    pub fn student_id(&self) -> StudentId {
        match self {
            BillingEvent::InvoiceIssued { student_id, .. } => *student_id,
            BillingEvent::InvoiceUpdated { student_id, .. } => *student_id,
            BillingEvent::CreditUpdated { student_id, .. } => *student_id,
            BillingEvent::PaymentReceived { student_id, .. } => *student_id,
            BillingEvent::PaymentReversed { student_id, .. } => *student_id,
            BillingEvent::InvoiceDeleted { student_id, .. } => *student_id,
        }
    }

    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BillingEvent::InvoiceIssued { timestamp, .. } => *timestamp,
            BillingEvent::InvoiceUpdated { timestamp, .. } => *timestamp,
            BillingEvent::CreditUpdated { timestamp, .. } => *timestamp,
            BillingEvent::PaymentReceived { timestamp, .. } => *timestamp,
            BillingEvent::PaymentReversed { timestamp, .. } => *timestamp,
            BillingEvent::InvoiceDeleted { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            BillingEvent::InvoiceIssued { .. } => "invoiceIssued",
            BillingEvent::InvoiceUpdated { .. } => "invoiceUpdated",
            BillingEvent::CreditUpdated { .. } => "creditUpdated",
            BillingEvent::PaymentReceived { .. } => "paymentReceived",
            BillingEvent::PaymentReversed { .. } => "paymentReversed",
            BillingEvent::InvoiceDeleted { .. } => "invoiceDeleted",
        }
    }
}

/// Best-effort event delivery
///
/// Wraps the sink with a per-event timeout. Failures and timeouts are
/// logged at warn level and swallowed; the ledger mutation these events
/// describe has already committed.
#[derive(Clone)]
pub struct EventDispatcher {
    sink: Arc<dyn EventSink>,
    timeout: Duration,
}

impl EventDispatcher {
    /// Creates a dispatcher with the given per-event timeout
    pub fn new(sink: Arc<dyn EventSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Delivers the events in order, best-effort
    pub async fn dispatch(&self, events: &[BillingEvent]) {
        for event in events {
            match tokio::time::timeout(self.timeout, self.sink.emit(event)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(
                        event = event.event_type(),
                        student = %event.student_id(),
                        error = %err,
                        "event delivery failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        event = event.event_type(),
                        student = %event.student_id(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "event delivery timed out"
                    );
                }
            }
        }
    }
}
