//! Comprehensive tests for domain_billing
//!
//! Exercises the services end-to-end against the in-memory adapters,
//! which share the versioned-commit semantics of the durable store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{
    Actor, ClassId, Currency, DomainPort, InvoiceId, Money, PaymentId, PortError, Role, StudentId,
    Term,
};
use domain_billing::ports::mock::{MemoryLedgerStore, MockDirectory, RecordingEventSink};
use domain_billing::{
    BillingError, EventDispatcher, FeeItem, GenerateClassInvoice, GenerateInvoice, InvoiceService,
    InvoiceStatus, LedgerMutation, LedgerStore, PaymentMethod, PaymentService, RecordPayment,
    ReportingService, ReversalService, ReversalTarget, Student,
};

const CURRENCY: Currency = Currency::KES;

fn money(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, CURRENCY)
}

fn items(amount: rust_decimal::Decimal) -> Vec<FeeItem> {
    vec![FeeItem::new("Tuition", money(amount))]
}

fn issued(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

struct Harness {
    store: Arc<MemoryLedgerStore>,
    directory: Arc<MockDirectory>,
    sink: Arc<RecordingEventSink>,
    invoices: InvoiceService,
    payments: PaymentService,
    reversals: ReversalService,
    reports: ReportingService,
    admin: Actor,
}

impl Harness {
    fn new() -> Self {
        Self::with_sink(Arc::new(RecordingEventSink::new()), Duration::from_millis(500))
    }

    fn with_sink(sink: Arc<RecordingEventSink>, timeout: Duration) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let directory = Arc::new(MockDirectory::new());
        let dispatcher = EventDispatcher::new(sink.clone(), timeout);

        Self {
            invoices: InvoiceService::new(
                store.clone(),
                directory.clone(),
                dispatcher.clone(),
                CURRENCY,
            ),
            payments: PaymentService::new(
                store.clone(),
                directory.clone(),
                dispatcher.clone(),
                CURRENCY,
            ),
            reversals: ReversalService::new(store.clone(), dispatcher, CURRENCY),
            reports: ReportingService::new(store.clone(), directory.clone(), CURRENCY),
            store,
            directory,
            sink,
            admin: Actor::admin(Uuid::new_v4()),
        }
    }

    async fn enroll(&self, reg_no: &str, class_id: Option<ClassId>) -> StudentId {
        let student = Student {
            id: StudentId::new(),
            first_name: "Amina".to_string(),
            last_name: reg_no.to_string(),
            reg_no: reg_no.to_string(),
            class_id,
        };
        let id = student.id;
        self.directory.add_student(student).await;
        id
    }

    async fn invoice_for(
        &self,
        student_id: StudentId,
        amount: rust_decimal::Decimal,
        day: u32,
    ) -> domain_billing::Invoice {
        self.invoices
            .generate_invoice(
                &self.admin,
                GenerateInvoice {
                    student_id,
                    term: Term::First,
                    year: 2026,
                    items: items(amount),
                    issued_date: issued(day),
                },
            )
            .await
            .unwrap()
    }

    async fn pay(
        &self,
        student_id: StudentId,
        amount: rust_decimal::Decimal,
    ) -> domain_billing::PaymentOutcome {
        self.payments
            .record_payment(
                &self.admin,
                RecordPayment {
                    student_id,
                    amount: money(amount),
                    method: PaymentMethod::Cash,
                    payment_date: None,
                },
            )
            .await
            .unwrap()
    }
}

// ============================================================================
// Invoice generation
// ============================================================================

mod invoice_generation {
    use super::*;

    #[tokio::test]
    async fn test_fresh_invoice_is_fully_outstanding() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let invoice = harness.invoice_for(student_id, dec!(1000), 10).await;

        assert_eq!(invoice.total_fees, money(dec!(1000)));
        assert_eq!(invoice.outstanding_balance, money(dec!(1000)));
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert!(invoice.payments.is_empty());
        assert_eq!(harness.sink.recorded_types().await, vec!["invoiceIssued"]);
    }

    #[tokio::test]
    async fn test_empty_items_rejected_before_any_mutation() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let result = harness
            .invoices
            .generate_invoice(
                &harness.admin,
                GenerateInvoice {
                    student_id,
                    term: Term::First,
                    year: 2026,
                    items: vec![],
                    issued_date: issued(10),
                },
            )
            .await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(harness.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_student_is_not_found() {
        let harness = Harness::new();

        let result = harness
            .invoices
            .generate_invoice(
                &harness.admin,
                GenerateInvoice {
                    student_id: StudentId::new(),
                    term: Term::First,
                    year: 2026,
                    items: items(dec!(100)),
                    issued_date: issued(10),
                },
            )
            .await;

        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_non_admin_is_denied() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let parent = Actor::new(Uuid::new_v4(), Role::Parent);

        let result = harness
            .invoices
            .generate_invoice(
                &parent,
                GenerateInvoice {
                    student_id,
                    term: Term::First,
                    year: 2026,
                    items: items(dec!(100)),
                    issued_date: issued(10),
                },
            )
            .await;

        assert!(matches!(
            result.unwrap_err(),
            BillingError::AccessDenied { .. }
        ));
    }

    #[tokio::test]
    async fn test_partial_credit_reduces_outstanding_once() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        // Prepayment of 300 with no invoices yet
        harness.pay(student_id, dec!(300)).await;

        let invoice = harness.invoice_for(student_id, dec!(1000), 10).await;

        assert_eq!(invoice.outstanding_balance, money(dec!(700)));
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert!(ledger.credit_amount(CURRENCY).is_zero());

        // The prepayment record was converted onto the invoice
        let linked = ledger.payments_for_invoice(invoice.id);
        assert_eq!(linked.len(), 1);
        assert!(linked[0].is_prepayment_applied());
        assert_eq!(linked[0].amount, money(dec!(300)));
        assert!(ledger.unallocated_prepayments().is_empty());
    }

    #[tokio::test]
    async fn test_credit_covering_fees_partially_consumes_record() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(250)).await;

        let invoice = harness.invoice_for(student_id, dec!(200), 10).await;

        assert!(invoice.outstanding_balance.is_zero());
        assert_eq!(invoice.status, InvoiceStatus::Paid);

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(50)));

        // 200 went onto the invoice, 50 stays unallocated
        let remaining = ledger.unallocated_prepayments();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].amount, money(dec!(50)));

        let linked = ledger.payments_for_invoice(invoice.id);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].amount, money(dec!(200)));
    }

    #[tokio::test]
    async fn test_converted_prepayments_never_recounted() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(250)).await;
        harness.invoice_for(student_id, dec!(200), 10).await;

        // Second invoice only sees the remaining 50 of credit
        let second = harness.invoice_for(student_id, dec!(100), 11).await;
        assert_eq!(second.outstanding_balance, money(dec!(50)));

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert!(ledger.credit_amount(CURRENCY).is_zero());
        assert!(ledger.unallocated_prepayments().is_empty());
    }
}

// ============================================================================
// Class-wide invoice generation
// ============================================================================

mod class_invoices {
    use super::*;

    #[tokio::test]
    async fn test_each_student_billed_against_own_credit() {
        let harness = Harness::new();
        let class_id = ClassId::new();

        let first = harness.enroll("S001", Some(class_id)).await;
        let second = harness.enroll("S002", Some(class_id)).await;
        let third = harness.enroll("S003", Some(class_id)).await;

        // One student prepaid 250
        harness.pay(second, dec!(250)).await;

        let outcome = harness
            .invoices
            .generate_class_invoice(
                &harness.admin,
                GenerateClassInvoice {
                    class_id,
                    term: Term::Second,
                    year: 2026,
                    items: items(dec!(200)),
                    issued_date: issued(15),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.invoices.len(), 3);
        assert!(outcome.failures.is_empty());

        for student_id in [first, third] {
            let ledger = harness.store.snapshot(student_id).await.unwrap();
            assert_eq!(ledger.invoices.len(), 1);
            assert_eq!(ledger.invoices[0].outstanding_balance, money(dec!(200)));
            assert_eq!(ledger.invoices[0].status, InvoiceStatus::Unpaid);
        }

        let ledger = harness.store.snapshot(second).await.unwrap();
        assert!(ledger.invoices[0].outstanding_balance.is_zero());
        assert_eq!(ledger.invoices[0].status, InvoiceStatus::Paid);
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(50)));
    }

    #[tokio::test]
    async fn test_empty_class_is_not_found() {
        let harness = Harness::new();

        let result = harness
            .invoices
            .generate_class_invoice(
                &harness.admin,
                GenerateClassInvoice {
                    class_id: ClassId::new(),
                    term: Term::First,
                    year: 2026,
                    items: items(dec!(200)),
                    issued_date: issued(15),
                },
            )
            .await;

        assert!(result.unwrap_err().is_not_found());
    }

    /// Store wrapper that refuses commits for one student
    struct FailingCommitStore {
        inner: Arc<MemoryLedgerStore>,
        fail_for: StudentId,
    }

    impl DomainPort for FailingCommitStore {}

    #[async_trait]
    impl LedgerStore for FailingCommitStore {
        async fn snapshot(
            &self,
            student_id: StudentId,
        ) -> Result<domain_billing::StudentLedger, PortError> {
            self.inner.snapshot(student_id).await
        }

        async fn commit(
            &self,
            student_id: StudentId,
            expected_version: u64,
            mutation: LedgerMutation,
        ) -> Result<(), PortError> {
            if student_id == self.fail_for {
                return Err(PortError::internal("disk full"));
            }
            self.inner.commit(student_id, expected_version, mutation).await
        }

        async fn get_invoice(
            &self,
            id: InvoiceId,
        ) -> Result<domain_billing::Invoice, PortError> {
            self.inner.get_invoice(id).await
        }

        async fn get_payment(
            &self,
            id: PaymentId,
        ) -> Result<domain_billing::Payment, PortError> {
            self.inner.get_payment(id).await
        }
    }

    #[tokio::test]
    async fn test_one_failing_student_does_not_sink_the_batch() {
        let inner = Arc::new(MemoryLedgerStore::new());
        let directory = Arc::new(MockDirectory::new());
        let sink = Arc::new(RecordingEventSink::new());
        let admin = Actor::admin(Uuid::new_v4());
        let class_id = ClassId::new();

        let mut student_ids = Vec::new();
        for reg in ["S001", "S002", "S003"] {
            let student = Student {
                id: StudentId::new(),
                first_name: "Amina".to_string(),
                last_name: reg.to_string(),
                reg_no: reg.to_string(),
                class_id: Some(class_id),
            };
            student_ids.push(student.id);
            directory.add_student(student).await;
        }

        let store = Arc::new(FailingCommitStore {
            inner: inner.clone(),
            fail_for: student_ids[1],
        });
        let service = InvoiceService::new(
            store,
            directory,
            EventDispatcher::new(sink, Duration::from_millis(500)),
            CURRENCY,
        );

        let outcome = service
            .generate_class_invoice(
                &admin,
                GenerateClassInvoice {
                    class_id,
                    term: Term::First,
                    year: 2026,
                    items: items(dec!(200)),
                    issued_date: issued(15),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.invoices.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].student_id, student_ids[1]);
        assert_eq!(inner.invoice_count().await, 2);
    }
}

// ============================================================================
// Payment processing
// ============================================================================

mod payment_processing {
    use super::*;

    #[tokio::test]
    async fn test_partial_then_exact_settlement() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 10).await;

        let outcome = harness.pay(student_id, dec!(400)).await;
        assert_eq!(outcome.applied_to_invoices.len(), 1);
        assert_eq!(outcome.applied_to_invoices[0].applied, money(dec!(400)));
        assert_eq!(
            outcome.applied_to_invoices[0].status,
            InvoiceStatus::PartiallyPaid
        );
        assert!(outcome.credited.is_zero());

        let outcome = harness.pay(student_id, dec!(600)).await;
        assert_eq!(outcome.applied_to_invoices[0].status, InvoiceStatus::Paid);

        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert!(stored.outstanding_balance.is_zero());
        assert_eq!(stored.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_no_invoices_becomes_credit() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let outcome = harness.pay(student_id, dec!(500)).await;

        assert!(outcome.applied_to_invoices.is_empty());
        assert_eq!(outcome.credited, money(dec!(500)));
        assert_eq!(outcome.credit_balance, money(dec!(500)));

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.payments.len(), 1);
        assert!(ledger.payments[0].is_credit_payment());
        assert!(ledger.payments[0].invoice_id.is_none());
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(500)));
    }

    #[tokio::test]
    async fn test_fifo_oldest_invoice_settled_first() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let older = harness.invoice_for(student_id, dec!(1000), 5).await;
        let newer = harness.invoice_for(student_id, dec!(800), 20).await;

        let outcome = harness.pay(student_id, dec!(400)).await;

        assert_eq!(outcome.applied_to_invoices.len(), 1);
        assert_eq!(outcome.applied_to_invoices[0].invoice_id, older.id);

        let untouched = harness.store.get_invoice(newer.id).await.unwrap();
        assert_eq!(untouched.outstanding_balance, money(dec!(800)));
    }

    #[tokio::test]
    async fn test_payment_spans_invoices_and_credits_leftover() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.invoice_for(student_id, dec!(300), 5).await;
        harness.invoice_for(student_id, dec!(500), 6).await;

        let outcome = harness.pay(student_id, dec!(900)).await;

        assert_eq!(outcome.applied_to_invoices.len(), 2);
        assert_eq!(outcome.credited, money(dec!(100)));

        // Conservation: applied + credited == amount
        let mut applied = Money::zero(CURRENCY);
        for application in &outcome.applied_to_invoices {
            applied = applied + application.applied;
        }
        assert_eq!(applied + outcome.credited, money(dec!(900)));

        // One record per invoice plus one credit record
        assert_eq!(harness.store.payment_count().await, 3);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let result = harness
            .payments
            .record_payment(
                &harness.admin,
                RecordPayment {
                    student_id,
                    amount: money(dec!(0)),
                    method: PaymentMethod::Cash,
                    payment_date: None,
                },
            )
            .await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(harness.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_events_per_invoice_plus_summary() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.invoice_for(student_id, dec!(300), 5).await;
        harness.invoice_for(student_id, dec!(500), 6).await;
        harness.pay(student_id, dec!(900)).await;

        let types = harness.sink.recorded_types().await;
        // Two issues, then: one invoiceUpdated per settled invoice, a
        // creditUpdated for the leftover, one paymentReceived summary
        assert_eq!(
            types,
            vec![
                "invoiceIssued",
                "invoiceIssued",
                "invoiceUpdated",
                "invoiceUpdated",
                "creditUpdated",
                "paymentReceived",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_event_sink_never_unwinds_the_ledger() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        harness.invoice_for(student_id, dec!(500), 5).await;

        harness.sink.set_failing(true);
        let outcome = harness.pay(student_id, dec!(200)).await;

        assert_eq!(outcome.applied_to_invoices.len(), 1);
        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.invoices[0].outstanding_balance, money(dec!(300)));
    }

    #[tokio::test]
    async fn test_slow_event_sink_times_out_quietly() {
        let sink = Arc::new(RecordingEventSink::with_delay(Duration::from_millis(200)));
        let harness = Harness::with_sink(sink.clone(), Duration::from_millis(20));
        let student_id = harness.enroll("S001", None).await;

        let outcome = harness.pay(student_id, dec!(100)).await;

        assert_eq!(outcome.credited, money(dec!(100)));
        assert!(sink.recorded().await.is_empty());

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(100)));
    }

    #[tokio::test]
    async fn test_concurrent_payments_never_double_apply() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 5).await;

        let (first, second) = tokio::join!(
            harness.payments.record_payment(
                &harness.admin,
                RecordPayment {
                    student_id,
                    amount: money(dec!(400)),
                    method: PaymentMethod::Cash,
                    payment_date: None,
                },
            ),
            harness.payments.record_payment(
                &harness.admin,
                RecordPayment {
                    student_id,
                    amount: money(dec!(700)),
                    method: PaymentMethod::BankTransfer,
                    payment_date: None,
                },
            ),
        );
        first.unwrap();
        second.unwrap();

        // 1100 received against 1000 of fees: invoice settled exactly,
        // the remaining 100 credited, nothing double-applied.
        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert!(stored.outstanding_balance.is_zero());

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(100)));

        let mut received = Money::zero(CURRENCY);
        for payment in &ledger.payments {
            received = received + payment.amount;
        }
        assert_eq!(received, money(dec!(1100)));
    }
}

// ============================================================================
// Reversals
// ============================================================================

mod reversals {
    use super::*;

    #[tokio::test]
    async fn test_reversal_is_the_exact_inverse() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 5).await;

        let outcome = harness.pay(student_id, dec!(400)).await;
        let payment_id = outcome.applied_to_invoices[0].payment_id;

        let reversal = harness
            .reversals
            .reverse_payment(&harness.admin, payment_id)
            .await
            .unwrap();

        match reversal.target {
            ReversalTarget::Invoice {
                invoice_id,
                outstanding_balance,
                status,
            } => {
                assert_eq!(invoice_id, invoice.id);
                assert_eq!(outstanding_balance, money(dec!(1000)));
                assert_eq!(status, InvoiceStatus::Unpaid);
            }
            other => panic!("expected invoice target, got {other:?}"),
        }

        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(stored.outstanding_balance, money(dec!(1000)));
        assert!(stored.payments.is_empty());
        assert_eq!(harness.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_reversing_a_credit_payment_decrements_credit() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(500)).await;
        let ledger = harness.store.snapshot(student_id).await.unwrap();
        let payment_id = ledger.payments[0].id;

        let reversal = harness
            .reversals
            .reverse_payment(&harness.admin, payment_id)
            .await
            .unwrap();

        match reversal.target {
            ReversalTarget::CreditBalance { new_balance } => {
                assert!(new_balance.is_zero());
            }
            other => panic!("expected credit target, got {other:?}"),
        }
        assert_eq!(harness.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_payment_is_not_found() {
        let harness = Harness::new();
        let result = harness
            .reversals
            .reverse_payment(&harness.admin, PaymentId::new())
            .await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_overshoot_is_reported_not_clamped() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 5).await;

        let outcome = harness.pay(student_id, dec!(400)).await;
        let payment_id = outcome.applied_to_invoices[0].payment_id;

        // Corrupt the ledger behind the service's back: raise the
        // outstanding balance so the reversal would overshoot the total.
        let ledger = harness.store.snapshot(student_id).await.unwrap();
        let mut corrupted = ledger.invoices[0].clone();
        corrupted.outstanding_balance = money(dec!(800));
        harness
            .store
            .commit(
                student_id,
                ledger.version,
                LedgerMutation {
                    upsert_invoices: vec![corrupted],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = harness
            .reversals
            .reverse_payment(&harness.admin, payment_id)
            .await;
        assert!(result.unwrap_err().is_consistency());

        // Nothing committed: the payment record and balance survive
        assert_eq!(harness.store.payment_count().await, 1);
        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(stored.outstanding_balance, money(dec!(800)));
    }

    #[tokio::test]
    async fn test_credit_underflow_is_reported_not_floored() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(500)).await;

        // Corrupt the credit balance below the payment amount
        let ledger = harness.store.snapshot(student_id).await.unwrap();
        let payment_id = ledger.payments[0].id;
        let mut corrupted = ledger.credit.clone().unwrap();
        corrupted.amount = money(dec!(100));
        harness
            .store
            .commit(
                student_id,
                ledger.version,
                LedgerMutation {
                    upsert_credit: Some(corrupted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = harness
            .reversals
            .reverse_payment(&harness.admin, payment_id)
            .await;
        assert!(result.unwrap_err().is_consistency());

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(100)));
        assert_eq!(ledger.payments.len(), 1);
    }

    #[tokio::test]
    async fn test_reversing_converted_prepayment_restores_invoice() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(300)).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 10).await;
        assert_eq!(invoice.outstanding_balance, money(dec!(700)));

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        let converted = ledger.payments_for_invoice(invoice.id)[0].id;

        harness
            .reversals
            .reverse_payment(&harness.admin, converted)
            .await
            .unwrap();

        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(stored.outstanding_balance, money(dec!(1000)));
        assert_eq!(stored.status, InvoiceStatus::Unpaid);
    }
}

// ============================================================================
// Invoice deletion
// ============================================================================

mod invoice_deletion {
    use super::*;

    #[tokio::test]
    async fn test_invoice_and_its_records_go_together() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 5).await;
        harness.pay(student_id, dec!(400)).await;

        let deletion = harness
            .reversals
            .delete_invoice(&harness.admin, invoice.id)
            .await
            .unwrap();

        assert_eq!(deletion.removed_payments.len(), 1);
        assert!(deletion.credit_restored.is_zero());
        assert_eq!(harness.store.invoice_count().await, 0);
        assert_eq!(harness.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_consumed_credit_is_restored_with_its_records() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(300)).await;
        let invoice = harness.invoice_for(student_id, dec!(1000), 10).await;

        let deletion = harness
            .reversals
            .delete_invoice(&harness.admin, invoice.id)
            .await
            .unwrap();

        assert_eq!(deletion.credit_restored, money(dec!(300)));

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert_eq!(ledger.credit_amount(CURRENCY), money(dec!(300)));
        assert!(ledger.invoices.is_empty());

        // The prepayment is unallocated again and backs the balance
        let prepayments = ledger.unallocated_prepayments();
        assert_eq!(prepayments.len(), 1);
        assert_eq!(prepayments[0].amount, money(dec!(300)));
    }

    #[tokio::test]
    async fn test_unknown_invoice_is_not_found() {
        let harness = Harness::new();
        let result = harness
            .reversals
            .delete_invoice(&harness.admin, InvoiceId::new())
            .await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_sibling_invoices_are_untouched() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        let doomed = harness.invoice_for(student_id, dec!(300), 5).await;
        let kept = harness.invoice_for(student_id, dec!(500), 6).await;
        harness.pay(student_id, dec!(600)).await;

        harness
            .reversals
            .delete_invoice(&harness.admin, doomed.id)
            .await
            .unwrap();

        let stored = harness.store.get_invoice(kept.id).await.unwrap();
        assert_eq!(stored.outstanding_balance, money(dec!(200)));
        assert_eq!(stored.payments.len(), 1);
    }
}

// ============================================================================
// Reporting
// ============================================================================

mod reporting {
    use super::*;
    use domain_billing::TransactionKind;

    #[tokio::test]
    async fn test_balances_cover_owing_and_prepaid_students() {
        let harness = Harness::new();
        let debtor = harness.enroll("S001", None).await;
        let prepaid = harness.enroll("S002", None).await;

        harness.invoice_for(debtor, dec!(1000), 5).await;
        harness.pay(debtor, dec!(300)).await;
        harness.pay(prepaid, dec!(50)).await;

        let balances = harness.reports.student_balances(&harness.admin).await.unwrap();
        assert_eq!(balances.len(), 2);

        let debtor_row = balances.iter().find(|b| b.student_id == debtor).unwrap();
        assert_eq!(debtor_row.outstanding_balance, money(dec!(700)));
        assert!(debtor_row.credit_balance.is_zero());
        assert_eq!(debtor_row.total_owed, money(dec!(700)));

        let prepaid_row = balances.iter().find(|b| b.student_id == prepaid).unwrap();
        assert!(prepaid_row.outstanding_balance.is_zero());
        assert_eq!(prepaid_row.credit_balance, money(dec!(50)));
        assert_eq!(prepaid_row.total_owed, money(dec!(-50)));
    }

    #[tokio::test]
    async fn test_history_is_merged_and_date_descending() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.invoice_for(student_id, dec!(1000), 5).await;
        harness.pay(student_id, dec!(400)).await;

        let history = harness
            .reports
            .transaction_history(&harness.admin, student_id)
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        // The payment happened after the invoice's issue date
        assert_eq!(history[0].kind, TransactionKind::Payment);
        assert_eq!(history[0].amount, money(dec!(400)));
        assert_eq!(history[1].kind, TransactionKind::Invoice);
        assert_eq!(history[1].amount, money(dec!(1000)));
        assert!(history[0].date >= history[1].date);
    }

    #[tokio::test]
    async fn test_history_for_unknown_student_is_not_found() {
        let harness = Harness::new();
        let result = harness
            .reports
            .transaction_history(&harness.admin, StudentId::new())
            .await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_student_invoice_summary() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.invoice_for(student_id, dec!(300), 5).await;
        harness.invoice_for(student_id, dec!(500), 6).await;
        harness.pay(student_id, dec!(100)).await;

        let summary = harness
            .reports
            .student_invoices(&harness.admin, student_id)
            .await
            .unwrap();

        assert_eq!(summary.invoices.len(), 2);
        assert_eq!(summary.total_outstanding, money(dec!(700)));
    }

    #[tokio::test]
    async fn test_reports_require_admin() {
        let harness = Harness::new();
        let teacher = Actor::new(Uuid::new_v4(), Role::Teacher);

        assert!(matches!(
            harness.reports.student_balances(&teacher).await.unwrap_err(),
            BillingError::AccessDenied { .. }
        ));
        assert!(matches!(
            harness
                .reports
                .transaction_history(&teacher, StudentId::new())
                .await
                .unwrap_err(),
            BillingError::AccessDenied { .. }
        ));
    }

    #[tokio::test]
    async fn test_get_invoice_and_payment_by_id() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;
        let invoice = harness.invoice_for(student_id, dec!(500), 5).await;
        let outcome = harness.pay(student_id, dec!(200)).await;

        let fetched = harness
            .reports
            .get_invoice(&harness.admin, invoice.id)
            .await
            .unwrap();
        assert_eq!(fetched.id, invoice.id);

        let payment_id = outcome.applied_to_invoices[0].payment_id;
        let fetched = harness
            .reports
            .get_payment(&harness.admin, payment_id)
            .await
            .unwrap();
        assert_eq!(fetched.amount, money(dec!(200)));
    }
}

// ============================================================================
// Ledger-wide invariants
// ============================================================================

mod invariants {
    use super::*;

    /// The credit amount always equals the sum of unallocated credit
    /// payment records.
    async fn assert_credit_backed(harness: &Harness, student_id: StudentId) {
        let ledger = harness.store.snapshot(student_id).await.unwrap();
        let mut backed = Money::zero(CURRENCY);
        for prepayment in ledger.unallocated_prepayments() {
            backed = backed + prepayment.amount;
        }
        assert_eq!(ledger.credit_amount(CURRENCY), backed);
    }

    #[tokio::test]
    async fn test_credit_stays_backed_by_records_throughout() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(250)).await;
        assert_credit_backed(&harness, student_id).await;

        let invoice = harness.invoice_for(student_id, dec!(200), 5).await;
        assert_credit_backed(&harness, student_id).await;

        harness.pay(student_id, dec!(500)).await;
        assert_credit_backed(&harness, student_id).await;

        harness
            .reversals
            .delete_invoice(&harness.admin, invoice.id)
            .await
            .unwrap();
        assert_credit_backed(&harness, student_id).await;
    }

    #[tokio::test]
    async fn test_credit_never_negative_across_sequences() {
        let harness = Harness::new();
        let student_id = harness.enroll("S001", None).await;

        harness.pay(student_id, dec!(100)).await;
        harness.invoice_for(student_id, dec!(400), 5).await;
        harness.pay(student_id, dec!(700)).await;
        let second = harness.invoice_for(student_id, dec!(900), 6).await;

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert!(!ledger.credit_amount(CURRENCY).is_negative());

        harness
            .reversals
            .delete_invoice(&harness.admin, second.id)
            .await
            .unwrap();

        let ledger = harness.store.snapshot(student_id).await.unwrap();
        assert!(!ledger.credit_amount(CURRENCY).is_negative());
    }
}
