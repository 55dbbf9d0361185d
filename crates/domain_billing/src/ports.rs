//! Billing Domain Ports
//!
//! Port interfaces for everything the ledger core needs from the outside
//! world: durable storage, the student/class directory, and event
//! delivery. Adapters implement these traits — PostgreSQL in `infra_db`,
//! in-memory mocks here for tests.
//!
//! # Consistency model
//!
//! [`LedgerStore`] exposes a per-student snapshot/commit pair. A service
//! reads a [`StudentLedger`] snapshot, computes a [`LedgerMutation`], and
//! commits it together with the snapshot's version. The store applies the
//! whole mutation atomically and rejects a stale version with
//! `PortError::Conflict`, which serializes concurrent mutations of the
//! same student's ledger while leaving different students fully parallel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{
    ClassId, Currency, DomainPort, InvoiceId, Money, PaymentId, PortError, StudentId,
};

use crate::credit::CreditBalance;
use crate::events::BillingEvent;
use crate::invoice::Invoice;
use crate::payment::Payment;

/// A student as the external directory describes one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Directory identifier
    pub id: StudentId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Registration number
    pub reg_no: String,
    /// Current class, if enrolled
    pub class_id: Option<ClassId>,
}

impl Student {
    /// Returns the student's display name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A consistent view of one student's ledger
///
/// Invoices arrive oldest-issued-first and payments oldest-received-first,
/// so FIFO settlement can walk them directly.
#[derive(Debug, Clone)]
pub struct StudentLedger {
    /// The student this snapshot belongs to
    pub student_id: StudentId,
    /// Optimistic-concurrency version; echoed back on commit
    pub version: u64,
    /// All invoices, FIFO by issued date
    pub invoices: Vec<Invoice>,
    /// All payment records, FIFO by payment date
    pub payments: Vec<Payment>,
    /// The credit balance, if one exists
    pub credit: Option<CreditBalance>,
}

impl StudentLedger {
    /// Invoices with an unpaid portion, in settlement order
    pub fn outstanding_invoices(&self) -> Vec<&Invoice> {
        self.invoices.iter().filter(|i| i.is_outstanding()).collect()
    }

    /// The credit amount, zero when no balance record exists
    pub fn credit_amount(&self, currency: Currency) -> Money {
        self.credit
            .as_ref()
            .map(|c| c.amount)
            .unwrap_or_else(|| Money::zero(currency))
    }

    /// Prepayment records not yet tied to an invoice, oldest first
    pub fn unallocated_prepayments(&self) -> Vec<&Payment> {
        self.payments.iter().filter(|p| p.is_credit_payment()).collect()
    }

    /// Looks up an invoice in the snapshot
    pub fn invoice(&self, id: InvoiceId) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    /// Looks up a payment in the snapshot
    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    /// Payment records applied to the given invoice
    pub fn payments_for_invoice(&self, id: InvoiceId) -> Vec<&Payment> {
        self.payments
            .iter()
            .filter(|p| p.invoice_id == Some(id))
            .collect()
    }
}

/// One atomic change set for a student's ledger
///
/// Everything in a mutation commits together or not at all; a payment
/// record is therefore never deleted before the compensating balance
/// change it travels with.
#[derive(Debug, Clone, Default)]
pub struct LedgerMutation {
    /// Invoices to insert or replace
    pub upsert_invoices: Vec<Invoice>,
    /// Invoices to remove
    pub delete_invoices: Vec<InvoiceId>,
    /// Payment records to insert
    pub insert_payments: Vec<Payment>,
    /// Payment records to replace (e.g. a partially consumed prepayment)
    pub update_payments: Vec<Payment>,
    /// Payment records to remove
    pub delete_payments: Vec<PaymentId>,
    /// Credit balance to insert or replace
    pub upsert_credit: Option<CreditBalance>,
}

impl LedgerMutation {
    /// Returns true if the mutation changes nothing
    pub fn is_empty(&self) -> bool {
        self.upsert_invoices.is_empty()
            && self.delete_invoices.is_empty()
            && self.insert_payments.is_empty()
            && self.update_payments.is_empty()
            && self.delete_payments.is_empty()
            && self.upsert_credit.is_none()
    }
}

/// Attempts a service makes before giving up on a conflicted commit
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Durable storage for the three ledger collections
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Reads a consistent snapshot of one student's ledger
    async fn snapshot(&self, student_id: StudentId) -> Result<StudentLedger, PortError>;

    /// Applies a mutation atomically
    ///
    /// # Errors
    ///
    /// Returns `PortError::Conflict` when `expected_version` no longer
    /// matches the stored version; the caller re-reads and retries.
    async fn commit(
        &self,
        student_id: StudentId,
        expected_version: u64,
        mutation: LedgerMutation,
    ) -> Result<(), PortError>;

    /// Fetches an invoice by id
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Fetches a payment by id
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError>;
}

/// The external student/class directory
#[async_trait]
pub trait StudentDirectory: DomainPort {
    /// Looks up a student
    async fn find_student(&self, id: StudentId) -> Result<Option<Student>, PortError>;

    /// Lists the students enrolled in a class
    async fn find_students_in_class(&self, class_id: ClassId) -> Result<Vec<Student>, PortError>;

    /// Lists all students
    async fn list_students(&self) -> Result<Vec<Student>, PortError>;
}

/// Outbound event delivery
#[async_trait]
pub trait EventSink: DomainPort {
    /// Emits one event
    async fn emit(&self, event: &BillingEvent) -> Result<(), PortError>;
}

/// An event sink that logs events instead of delivering them anywhere
///
/// Useful as the default wiring when no realtime transport is configured.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl DomainPort for TracingEventSink {}

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &BillingEvent) -> Result<(), PortError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| PortError::internal(format!("event serialization failed: {err}")))?;
        tracing::info!(event = event.event_type(), %payload, "billing event");
        Ok(())
    }
}

/// In-memory adapters for testing
///
/// These mirror the durable adapters' semantics exactly — including the
/// versioned commit — so ledger behavior can be exercised without a
/// database or transport.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct LedgerCells {
        invoices: HashMap<InvoiceId, Invoice>,
        payments: HashMap<PaymentId, Payment>,
        credits: HashMap<StudentId, CreditBalance>,
        versions: HashMap<StudentId, u64>,
    }

    /// In-memory implementation of [`LedgerStore`]
    #[derive(Debug, Default)]
    pub struct MemoryLedgerStore {
        cells: Arc<RwLock<LedgerCells>>,
    }

    impl MemoryLedgerStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns the number of stored payment records (test helper)
        pub async fn payment_count(&self) -> usize {
            self.cells.read().await.payments.len()
        }

        /// Returns the number of stored invoices (test helper)
        pub async fn invoice_count(&self) -> usize {
            self.cells.read().await.invoices.len()
        }
    }

    impl DomainPort for MemoryLedgerStore {}

    #[async_trait]
    impl LedgerStore for MemoryLedgerStore {
        async fn snapshot(&self, student_id: StudentId) -> Result<StudentLedger, PortError> {
            let cells = self.cells.read().await;

            let mut invoices: Vec<Invoice> = cells
                .invoices
                .values()
                .filter(|i| i.student_id == student_id)
                .cloned()
                .collect();
            invoices.sort_by(|a, b| {
                a.issued_date
                    .cmp(&b.issued_date)
                    .then(a.created_at.cmp(&b.created_at))
            });

            let mut payments: Vec<Payment> = cells
                .payments
                .values()
                .filter(|p| p.student_id == student_id)
                .cloned()
                .collect();
            payments.sort_by(|a, b| {
                a.payment_date
                    .cmp(&b.payment_date)
                    .then(a.created_at.cmp(&b.created_at))
            });

            Ok(StudentLedger {
                student_id,
                version: cells.versions.get(&student_id).copied().unwrap_or(0),
                invoices,
                payments,
                credit: cells.credits.get(&student_id).cloned(),
            })
        }

        async fn commit(
            &self,
            student_id: StudentId,
            expected_version: u64,
            mutation: LedgerMutation,
        ) -> Result<(), PortError> {
            let mut cells = self.cells.write().await;

            let current = cells.versions.entry(student_id).or_insert(0);
            if *current != expected_version {
                return Err(PortError::conflict(format!(
                    "ledger for student {student_id} moved from version {expected_version} to {current}"
                )));
            }
            *current += 1;

            for id in &mutation.delete_payments {
                cells.payments.remove(id);
            }
            for id in &mutation.delete_invoices {
                cells.invoices.remove(id);
            }
            for payment in mutation.update_payments {
                cells.payments.insert(payment.id, payment);
            }
            for payment in mutation.insert_payments {
                cells.payments.insert(payment.id, payment);
            }
            for invoice in mutation.upsert_invoices {
                cells.invoices.insert(invoice.id, invoice);
            }
            if let Some(credit) = mutation.upsert_credit {
                cells.credits.insert(student_id, credit);
            }

            Ok(())
        }

        async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.cells
                .read()
                .await
                .invoices
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError> {
            self.cells
                .read()
                .await
                .payments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Payment", id))
        }
    }

    /// In-memory implementation of [`StudentDirectory`]
    #[derive(Debug, Default)]
    pub struct MockDirectory {
        students: Arc<RwLock<HashMap<StudentId, Student>>>,
    }

    impl MockDirectory {
        /// Creates an empty directory
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates the directory
        pub async fn with_students(students: Vec<Student>) -> Self {
            let directory = Self::new();
            for student in students {
                directory.add_student(student).await;
            }
            directory
        }

        /// Registers a student
        pub async fn add_student(&self, student: Student) {
            self.students.write().await.insert(student.id, student);
        }
    }

    impl DomainPort for MockDirectory {}

    #[async_trait]
    impl StudentDirectory for MockDirectory {
        async fn find_student(&self, id: StudentId) -> Result<Option<Student>, PortError> {
            Ok(self.students.read().await.get(&id).cloned())
        }

        async fn find_students_in_class(
            &self,
            class_id: ClassId,
        ) -> Result<Vec<Student>, PortError> {
            let mut students: Vec<Student> = self
                .students
                .read()
                .await
                .values()
                .filter(|s| s.class_id == Some(class_id))
                .cloned()
                .collect();
            students.sort_by(|a, b| a.reg_no.cmp(&b.reg_no));
            Ok(students)
        }

        async fn list_students(&self) -> Result<Vec<Student>, PortError> {
            let mut students: Vec<Student> =
                self.students.read().await.values().cloned().collect();
            students.sort_by(|a, b| a.reg_no.cmp(&b.reg_no));
            Ok(students)
        }
    }

    /// An event sink that records what it receives
    #[derive(Debug, Default)]
    pub struct RecordingEventSink {
        events: Arc<RwLock<Vec<BillingEvent>>>,
        fail: Arc<AtomicBool>,
        delay: Option<Duration>,
    }

    impl RecordingEventSink {
        /// Creates a sink that accepts everything
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a sink that delays each emit (for timeout tests)
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        /// Makes subsequent emits fail
        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        /// Returns the recorded events
        pub async fn recorded(&self) -> Vec<BillingEvent> {
            self.events.read().await.clone()
        }

        /// Returns the recorded event type names, in order
        pub async fn recorded_types(&self) -> Vec<&'static str> {
            self.events.read().await.iter().map(|e| e.event_type()).collect()
        }
    }

    impl DomainPort for RecordingEventSink {}

    #[async_trait]
    impl EventSink for RecordingEventSink {
        async fn emit(&self, event: &BillingEvent) -> Result<(), PortError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "event-sink".to_string(),
                });
            }
            self.events.write().await.push(event.clone());
            Ok(())
        }
    }
}
