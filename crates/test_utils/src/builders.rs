//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about.

use chrono::{DateTime, NaiveDate, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

use core_kernel::{ClassId, CreditBalanceId, InvoiceId, Money, StudentId, Term};
use domain_billing::{FeeItem, Invoice, Payment, PaymentMethod, Student};

use crate::fixtures::{MoneyFixtures, TermFixtures};

/// Builder for directory students
pub struct StudentBuilder {
    id: StudentId,
    first_name: String,
    last_name: String,
    reg_no: String,
    class_id: Option<ClassId>,
}

impl Default for StudentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentBuilder {
    /// Creates a builder with generated names and registration number
    pub fn new() -> Self {
        let id = StudentId::new();
        Self {
            id,
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
            reg_no: format!("REG-{}", &id.as_uuid().simple().to_string()[..8]),
            class_id: None,
        }
    }

    /// Sets the student id
    pub fn with_id(mut self, id: StudentId) -> Self {
        self.id = id;
        self
    }

    /// Sets the registration number
    pub fn with_reg_no(mut self, reg_no: impl Into<String>) -> Self {
        self.reg_no = reg_no.into();
        self
    }

    /// Enrolls the student in a class
    pub fn in_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Builds the student
    pub fn build(self) -> Student {
        Student {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            reg_no: self.reg_no,
            class_id: self.class_id,
        }
    }
}

/// Builder for invoices
pub struct InvoiceBuilder {
    student_id: StudentId,
    class_id: Option<ClassId>,
    term: Term,
    year: i32,
    items: Vec<FeeItem>,
    issued_date: NaiveDate,
    paid_down_to: Option<Money>,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    /// Creates a builder for a one-item tuition invoice
    pub fn new() -> Self {
        Self {
            student_id: StudentId::new(),
            class_id: None,
            term: TermFixtures::term(),
            year: TermFixtures::year(),
            items: vec![FeeItem::new("Tuition", MoneyFixtures::tuition_fee())],
            issued_date: TermFixtures::issue_date(),
            paid_down_to: None,
        }
    }

    /// Sets the billed student
    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    /// Sets the term
    pub fn with_term(mut self, term: Term, year: i32) -> Self {
        self.term = term;
        self.year = year;
        self
    }

    /// Replaces the fee items
    pub fn with_items(mut self, items: Vec<FeeItem>) -> Self {
        self.items = items;
        self
    }

    /// Adds a fee item
    pub fn with_item(mut self, name: impl Into<String>, amount: Money) -> Self {
        self.items.push(FeeItem::new(name, amount));
        self
    }

    /// Sets the issue date
    pub fn issued_on(mut self, date: NaiveDate) -> Self {
        self.issued_date = date;
        self
    }

    /// Starts the invoice at the given outstanding balance instead of
    /// fully unpaid
    pub fn outstanding(mut self, balance: Money) -> Self {
        self.paid_down_to = Some(balance);
        self
    }

    /// Builds the invoice
    pub fn build(self) -> Invoice {
        let total = self
            .items
            .iter()
            .fold(MoneyFixtures::zero(), |acc, item| acc + item.amount);
        let outstanding = self.paid_down_to.unwrap_or(total);

        Invoice::issue(
            self.student_id,
            self.class_id,
            self.term,
            self.year,
            self.items,
            total,
            outstanding,
            self.issued_date,
        )
    }
}

/// Builder for payment records
pub struct PaymentBuilder {
    student_id: StudentId,
    invoice_id: Option<InvoiceId>,
    credit_balance_id: Option<CreditBalanceId>,
    amount: Money,
    method: PaymentMethod,
    payment_date: DateTime<Utc>,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    /// Creates a builder for a cash partial payment
    pub fn new() -> Self {
        Self {
            student_id: StudentId::new(),
            invoice_id: None,
            credit_balance_id: None,
            amount: MoneyFixtures::partial_payment(),
            method: PaymentMethod::Cash,
            payment_date: Utc::now(),
        }
    }

    /// Sets the paying student
    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    /// Targets an invoice
    pub fn against_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    /// Marks the record as a prepayment into the given balance
    pub fn as_prepayment(mut self, credit_balance_id: CreditBalanceId) -> Self {
        self.credit_balance_id = Some(credit_balance_id);
        self.invoice_id = None;
        self
    }

    /// Sets the amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the method
    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the payment date
    pub fn on(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = payment_date;
        self
    }

    /// Builds the payment record
    pub fn build(self) -> Payment {
        match (self.invoice_id, self.credit_balance_id) {
            (Some(invoice_id), _) => Payment::for_invoice(
                self.student_id,
                invoice_id,
                self.amount,
                self.method,
                self.payment_date,
            ),
            (None, Some(credit_balance_id)) => Payment::prepayment(
                self.student_id,
                credit_balance_id,
                self.amount,
                self.method,
                self.payment_date,
            ),
            (None, None) => Payment::for_invoice(
                self.student_id,
                InvoiceId::new(),
                self.amount,
                self.method,
                self.payment_date,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::InvoiceStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_student_builder_defaults() {
        let student = StudentBuilder::new().build();
        assert!(!student.first_name.is_empty());
        assert!(student.reg_no.starts_with("REG-"));
        assert!(student.class_id.is_none());
    }

    #[test]
    fn test_invoice_builder_defaults_to_unpaid() {
        let invoice = InvoiceBuilder::new().build();
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert_eq!(invoice.total_fees, invoice.outstanding_balance);
    }

    #[test]
    fn test_invoice_builder_with_balance() {
        let invoice = InvoiceBuilder::new()
            .outstanding(Money::new(dec!(600), crate::fixtures::TEST_CURRENCY))
            .build();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn test_payment_builder_prepayment_shape() {
        let payment = PaymentBuilder::new()
            .as_prepayment(CreditBalanceId::new())
            .build();
        assert!(payment.is_credit_payment());
    }
}
