//! Billing Domain - Student Fee Ledger
//!
//! This crate implements the billing ledger core: fee invoicing, payment
//! allocation, credit (prepayment) balances, and reversals, kept consistent
//! per student.
//!
//! # Ledger rules
//!
//! - An invoice's `status` is a pure function of its outstanding balance
//!   against its total fees and is recomputed on every balance mutation.
//! - Payments settle outstanding invoices oldest-issued-first; whatever is
//!   left over is absorbed into the student's credit balance.
//! - Issuing an invoice consumes available credit exactly once.
//! - A payment's financial effect is undone before its record is deleted,
//!   and an invoice is deleted together with its payment records as a
//!   single unit of work.
//! - The sum of amounts applied to invoices plus the change in credit
//!   always equals the amount received.
//!
//! # Architecture
//!
//! The allocation engine (`allocation`) is pure and performs no I/O.
//! Services (`generator`, `processor`, `reversal`, `reporting`) read a
//! consistent per-student snapshot through the [`ports::LedgerStore`]
//! port, compute a mutation, and commit it atomically under an optimistic
//! version check. Domain events are returned as data and dispatched
//! best-effort after the commit.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{PaymentService, RecordPayment};
//!
//! let outcome = payments
//!     .record_payment(&actor, RecordPayment {
//!         student_id,
//!         amount: Money::new(dec!(400), Currency::KES),
//!         method: PaymentMethod::Cash,
//!         payment_date: None,
//!     })
//!     .await?;
//! ```

pub mod error;
pub mod invoice;
pub mod payment;
pub mod credit;
pub mod allocation;
pub mod validation;
pub mod events;
pub mod ports;
pub mod generator;
pub mod processor;
pub mod reversal;
pub mod reporting;

pub use error::BillingError;
pub use invoice::{FeeItem, Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentMethod};
pub use credit::CreditBalance;
pub use allocation::{AllocationPlan, CreditApplication, InvoiceAllocation, OutstandingInvoice};
pub use events::{BillingEvent, EventDispatcher};
pub use ports::{EventSink, LedgerMutation, LedgerStore, Student, StudentDirectory, StudentLedger};
pub use generator::{ClassInvoiceOutcome, GenerateClassInvoice, GenerateInvoice, InvoiceService};
pub use processor::{AppliedPayment, PaymentOutcome, PaymentService, RecordPayment};
pub use reversal::{InvoiceDeletion, PaymentReversal, ReversalService, ReversalTarget};
pub use reporting::{LedgerTransaction, ReportingService, StudentBalance, StudentInvoiceSummary, TransactionKind};
