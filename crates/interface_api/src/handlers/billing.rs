//! Billing handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use core_kernel::{Actor, ClassId, InvoiceId, Money, PaymentId, StudentId};
use domain_billing::{GenerateClassInvoice, GenerateInvoice, RecordPayment};

use crate::dto::billing::*;
use crate::{error::ApiError, AppState};

/// Issues an invoice for one student
pub async fn generate_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let currency = state.config.currency;
    let invoice = state
        .invoices
        .generate_invoice(
            &actor,
            GenerateInvoice {
                student_id: StudentId::from_uuid(request.student_id),
                term: request.term,
                year: request.year,
                items: request
                    .items
                    .into_iter()
                    .map(|item| item.into_domain(currency))
                    .collect(),
                issued_date: request.issued_date,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(&invoice))))
}

/// Issues invoices for every student in a class
pub async fn generate_class_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<GenerateClassInvoiceRequest>,
) -> Result<(StatusCode, Json<ClassInvoiceResponse>), ApiError> {
    let currency = state.config.currency;
    let outcome = state
        .invoices
        .generate_class_invoice(
            &actor,
            GenerateClassInvoice {
                class_id: ClassId::from_uuid(request.class_id),
                term: request.term,
                year: request.year,
                items: request
                    .items
                    .into_iter()
                    .map(|item| item.into_domain(currency))
                    .collect(),
                issued_date: request.issued_date,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ClassInvoiceResponse::from(&outcome)),
    ))
}

/// Fetches an invoice by id
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state
        .reports
        .get_invoice(&actor, InvoiceId::from_uuid(id))
        .await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

/// Deletes an invoice together with its payment records
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDeletionResponse>, ApiError> {
    let deletion = state
        .reversals
        .delete_invoice(&actor, InvoiceId::from_uuid(id))
        .await?;
    Ok(Json(InvoiceDeletionResponse::from(&deletion)))
}

/// Records a payment and applies it to outstanding invoices
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<PaymentOutcomeResponse>, ApiError> {
    let outcome = state
        .payments
        .record_payment(
            &actor,
            RecordPayment {
                student_id: StudentId::from_uuid(request.student_id),
                amount: Money::new(request.amount, state.config.currency),
                method: request.method,
                payment_date: request.payment_date,
            },
        )
        .await?;

    Ok(Json(PaymentOutcomeResponse::from(&outcome)))
}

/// Fetches a payment by id
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .reports
        .get_payment(&actor, PaymentId::from_uuid(id))
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// Reverses a payment's financial effect and deletes its record
pub async fn reverse_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReversalResponse>, ApiError> {
    let reversal = state
        .reversals
        .reverse_payment(&actor, PaymentId::from_uuid(id))
        .await?;
    Ok(Json(PaymentReversalResponse::from(&reversal)))
}

/// Lists every student's outstanding and credit position
pub async fn student_balances(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<StudentBalanceResponse>>, ApiError> {
    let balances = state.reports.student_balances(&actor).await?;
    Ok(Json(
        balances.iter().map(StudentBalanceResponse::from).collect(),
    ))
}

/// Returns the merged payment/invoice history for a student
pub async fn transaction_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let history = state
        .reports
        .transaction_history(&actor, StudentId::from_uuid(id))
        .await?;
    Ok(Json(history.iter().map(TransactionResponse::from).collect()))
}

/// Returns a student's invoices and total outstanding balance
pub async fn student_invoices(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<StudentInvoicesResponse>, ApiError> {
    let summary = state
        .reports
        .student_invoices(&actor, StudentId::from_uuid(id))
        .await?;
    Ok(Json(StudentInvoicesResponse::from(&summary)))
}
