//! Ledger store repository
//!
//! PostgreSQL implementation of the billing ledger store. A commit runs in
//! a single transaction that takes a per-student advisory lock and checks
//! the optimistic version, so all of a mutation's invoice, payment, and
//! credit changes land together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::{
    CreditBalanceId, Currency, DomainPort, InvoiceId, Money, PaymentId, PortError, StudentId, Term,
};
use domain_billing::{
    CreditBalance, Invoice, InvoiceStatus, LedgerMutation, LedgerStore, Payment, PaymentMethod,
    StudentLedger,
};

use crate::error::DatabaseError;

/// PostgreSQL-backed [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_snapshot(&self, student_id: StudentId) -> Result<StudentLedger, DatabaseError> {
        let student_uuid = *student_id.as_uuid();
        let mut tx = self.pool.begin().await?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM ledger_versions WHERE student_id = $1")
                .bind(student_uuid)
                .fetch_optional(&mut *tx)
                .await?;

        let invoice_rows: Vec<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT invoice_id, student_id, class_id, term, year, items, currency,
                   total_fees, outstanding_balance, payment_ids, status,
                   issued_date, created_at, updated_at
            FROM invoices
            WHERE student_id = $1
            ORDER BY issued_date, created_at
            "#,
        )
        .bind(student_uuid)
        .fetch_all(&mut *tx)
        .await?;

        let payment_rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT payment_id, student_id, invoice_id, credit_balance_id, currency,
                   amount, payment_date, method, reference, created_at
            FROM payments
            WHERE student_id = $1
            ORDER BY payment_date, created_at
            "#,
        )
        .bind(student_uuid)
        .fetch_all(&mut *tx)
        .await?;

        let credit_row: Option<CreditRow> = sqlx::query_as(
            r#"
            SELECT credit_balance_id, student_id, currency, amount, last_updated
            FROM credit_balances
            WHERE student_id = $1
            "#,
        )
        .bind(student_uuid)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        let invoices = invoice_rows
            .into_iter()
            .map(Invoice::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let payments = payment_rows
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let credit = credit_row.map(CreditBalance::try_from).transpose()?;

        Ok(StudentLedger {
            student_id,
            version: version.unwrap_or(0) as u64,
            invoices,
            payments,
            credit,
        })
    }

    async fn apply_commit(
        &self,
        student_id: StudentId,
        expected_version: u64,
        mutation: LedgerMutation,
    ) -> Result<(), DatabaseError> {
        let student_uuid = *student_id.as_uuid();
        let mut tx = self.pool.begin().await?;

        // Serialize writers for this student; readers are unaffected.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_key(student_id))
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO ledger_versions (student_id, version) VALUES ($1, 0)
             ON CONFLICT (student_id) DO NOTHING",
        )
        .bind(student_uuid)
        .execute(&mut *tx)
        .await?;

        let actual: i64 = sqlx::query_scalar(
            "SELECT version FROM ledger_versions WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_uuid)
        .fetch_one(&mut *tx)
        .await?;

        if actual as u64 != expected_version {
            return Err(DatabaseError::StaleVersion {
                expected: expected_version,
                actual: actual as u64,
            });
        }

        if !mutation.delete_payments.is_empty() {
            let ids: Vec<Uuid> = mutation
                .delete_payments
                .iter()
                .map(|id| *id.as_uuid())
                .collect();
            sqlx::query("DELETE FROM payments WHERE payment_id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        if !mutation.delete_invoices.is_empty() {
            let ids: Vec<Uuid> = mutation
                .delete_invoices
                .iter()
                .map(|id| *id.as_uuid())
                .collect();
            sqlx::query("DELETE FROM invoices WHERE invoice_id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        for payment in mutation
            .update_payments
            .iter()
            .chain(mutation.insert_payments.iter())
        {
            upsert_payment(&mut tx, payment).await?;
        }

        for invoice in &mutation.upsert_invoices {
            upsert_invoice(&mut tx, invoice).await?;
        }

        if let Some(credit) = &mutation.upsert_credit {
            upsert_credit(&mut tx, credit).await?;
        }

        sqlx::query("UPDATE ledger_versions SET version = version + 1 WHERE student_id = $1")
            .bind(student_uuid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

impl DomainPort for PgLedgerStore {}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn snapshot(&self, student_id: StudentId) -> Result<StudentLedger, PortError> {
        Ok(self.load_snapshot(student_id).await?)
    }

    async fn commit(
        &self,
        student_id: StudentId,
        expected_version: u64,
        mutation: LedgerMutation,
    ) -> Result<(), PortError> {
        tracing::debug!(
            student = %student_id,
            expected_version,
            "committing ledger mutation"
        );
        Ok(self
            .apply_commit(student_id, expected_version, mutation)
            .await?)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT invoice_id, student_id, class_id, term, year, items, currency,
                   total_fees, outstanding_balance, payment_ids, status,
                   issued_date, created_at, updated_at
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let row = row.ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        Ok(Invoice::try_from(row)?)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT payment_id, student_id, invoice_id, credit_balance_id, currency,
                   amount, payment_date, method, reference, created_at
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let row = row.ok_or_else(|| DatabaseError::not_found("Payment", id))?;
        Ok(Payment::try_from(row)?)
    }
}

async fn upsert_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    let items = serde_json::to_value(&invoice.items)
        .map_err(|e| DatabaseError::corrupt(format!("fee items encode failed: {e}")))?;
    let payment_ids = serde_json::to_value(&invoice.payments)
        .map_err(|e| DatabaseError::corrupt(format!("payment ids encode failed: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_id, student_id, class_id, term, year, items, currency,
            total_fees, outstanding_balance, payment_ids, status,
            issued_date, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (invoice_id) DO UPDATE SET
            outstanding_balance = EXCLUDED.outstanding_balance,
            payment_ids = EXCLUDED.payment_ids,
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(*invoice.id.as_uuid())
    .bind(*invoice.student_id.as_uuid())
    .bind(invoice.class_id.map(|id| *id.as_uuid()))
    .bind(invoice.term.to_string())
    .bind(invoice.year)
    .bind(items)
    .bind(invoice.total_fees.currency().code())
    .bind(invoice.total_fees.amount())
    .bind(invoice.outstanding_balance.amount())
    .bind(payment_ids)
    .bind(status_str(invoice.status))
    .bind(invoice.issued_date)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn upsert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &Payment,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, student_id, invoice_id, credit_balance_id, currency,
            amount, payment_date, method, reference, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (payment_id) DO UPDATE SET
            invoice_id = EXCLUDED.invoice_id,
            credit_balance_id = EXCLUDED.credit_balance_id,
            amount = EXCLUDED.amount,
            reference = EXCLUDED.reference
        "#,
    )
    .bind(*payment.id.as_uuid())
    .bind(*payment.student_id.as_uuid())
    .bind(payment.invoice_id.map(|id| *id.as_uuid()))
    .bind(payment.credit_balance_id.map(|id| *id.as_uuid()))
    .bind(payment.amount.currency().code())
    .bind(payment.amount.amount())
    .bind(payment.payment_date)
    .bind(method_str(payment.method))
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn upsert_credit(
    tx: &mut Transaction<'_, Postgres>,
    credit: &CreditBalance,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO credit_balances (
            credit_balance_id, student_id, currency, amount, last_updated
        ) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id) DO UPDATE SET
            amount = EXCLUDED.amount,
            last_updated = EXCLUDED.last_updated
        "#,
    )
    .bind(*credit.id.as_uuid())
    .bind(*credit.student_id.as_uuid())
    .bind(credit.amount.currency().code())
    .bind(credit.amount.amount())
    .bind(credit.last_updated)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Advisory-lock key derived from the student id
fn advisory_key(student_id: StudentId) -> i64 {
    let b = student_id.as_uuid().as_bytes();
    i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn status_str(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Unpaid => "Unpaid",
        InvoiceStatus::PartiallyPaid => "Partially Paid",
        InvoiceStatus::Paid => "Paid",
    }
}

fn parse_status(value: &str) -> Result<InvoiceStatus, DatabaseError> {
    match value {
        "Unpaid" => Ok(InvoiceStatus::Unpaid),
        "Partially Paid" => Ok(InvoiceStatus::PartiallyPaid),
        "Paid" => Ok(InvoiceStatus::Paid),
        other => Err(DatabaseError::corrupt(format!(
            "unknown invoice status '{other}'"
        ))),
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Cash",
        PaymentMethod::BankTransfer => "Bank Transfer",
        PaymentMethod::Credit => "Credit",
        PaymentMethod::MobileMoney => "Mobile Money",
    }
}

fn parse_method(value: &str) -> Result<PaymentMethod, DatabaseError> {
    match value {
        "Cash" => Ok(PaymentMethod::Cash),
        "Bank Transfer" => Ok(PaymentMethod::BankTransfer),
        "Credit" => Ok(PaymentMethod::Credit),
        "Mobile Money" => Ok(PaymentMethod::MobileMoney),
        other => Err(DatabaseError::corrupt(format!(
            "unknown payment method '{other}'"
        ))),
    }
}

fn parse_currency(value: &str) -> Result<Currency, DatabaseError> {
    value
        .parse::<Currency>()
        .map_err(|e| DatabaseError::corrupt(e.to_string()))
}

fn parse_term(value: &str) -> Result<Term, DatabaseError> {
    value
        .parse::<Term>()
        .map_err(|e| DatabaseError::corrupt(e.to_string()))
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    student_id: Uuid,
    class_id: Option<Uuid>,
    term: String,
    year: i32,
    items: serde_json::Value,
    currency: String,
    total_fees: Decimal,
    outstanding_balance: Decimal,
    payment_ids: serde_json::Value,
    status: String,
    issued_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let currency = parse_currency(&row.currency)?;
        let items = serde_json::from_value(row.items)
            .map_err(|e| DatabaseError::corrupt(format!("fee items decode failed: {e}")))?;
        let payments = serde_json::from_value(row.payment_ids)
            .map_err(|e| DatabaseError::corrupt(format!("payment ids decode failed: {e}")))?;

        Ok(Invoice {
            id: InvoiceId::from_uuid(row.invoice_id),
            student_id: StudentId::from_uuid(row.student_id),
            class_id: row.class_id.map(core_kernel::ClassId::from_uuid),
            term: parse_term(&row.term)?,
            year: row.year,
            items,
            total_fees: Money::new(row.total_fees, currency),
            outstanding_balance: Money::new(row.outstanding_balance, currency),
            payments,
            status: parse_status(&row.status)?,
            issued_date: row.issued_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    student_id: Uuid,
    invoice_id: Option<Uuid>,
    credit_balance_id: Option<Uuid>,
    currency: String,
    amount: Decimal,
    payment_date: DateTime<Utc>,
    method: String,
    reference: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = parse_currency(&row.currency)?;

        Ok(Payment {
            id: PaymentId::from_uuid(row.payment_id),
            student_id: StudentId::from_uuid(row.student_id),
            invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
            credit_balance_id: row.credit_balance_id.map(CreditBalanceId::from_uuid),
            amount: Money::new(row.amount, currency),
            payment_date: row.payment_date,
            method: parse_method(&row.method)?,
            reference: row.reference,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreditRow {
    credit_balance_id: Uuid,
    student_id: Uuid,
    currency: String,
    amount: Decimal,
    last_updated: DateTime<Utc>,
}

impl TryFrom<CreditRow> for CreditBalance {
    type Error = DatabaseError;

    fn try_from(row: CreditRow) -> Result<Self, Self::Error> {
        let currency = parse_currency(&row.currency)?;

        Ok(CreditBalance {
            id: CreditBalanceId::from_uuid(row.credit_balance_id),
            student_id: StudentId::from_uuid(row.student_id),
            amount: Money::new(row.amount, currency),
            last_updated: row.last_updated,
        })
    }
}
