//! HTTP API Layer
//!
//! REST API for the billing ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for the billing operations
//! - **Middleware**: JWT authentication and audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent, distinguishable error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(store, directory, sink, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_billing::{
    EventDispatcher, EventSink, InvoiceService, LedgerStore, PaymentService, ReportingService,
    ReversalService, StudentDirectory,
};

use crate::config::ApiConfig;
use crate::handlers::{billing, health};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<InvoiceService>,
    pub payments: Arc<PaymentService>,
    pub reversals: Arc<ReversalService>,
    pub reports: Arc<ReportingService>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the domain services over the given adapters
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn StudentDirectory>,
        sink: Arc<dyn EventSink>,
        config: ApiConfig,
    ) -> Self {
        let dispatcher = EventDispatcher::new(sink, config.event_timeout());
        let currency = config.currency;

        Self {
            invoices: Arc::new(InvoiceService::new(
                store.clone(),
                directory.clone(),
                dispatcher.clone(),
                currency,
            )),
            payments: Arc::new(PaymentService::new(
                store.clone(),
                directory.clone(),
                dispatcher.clone(),
                currency,
            )),
            reversals: Arc::new(ReversalService::new(store.clone(), dispatcher, currency)),
            reports: Arc::new(ReportingService::new(store, directory, currency)),
            config,
        }
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Application state with the wired services
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Billing routes
    let billing_routes = Router::new()
        .route("/invoices", post(billing::generate_invoice))
        .route("/invoices/class", post(billing::generate_class_invoice))
        .route("/invoices/:id", get(billing::get_invoice))
        .route("/invoices/:id", delete(billing::delete_invoice))
        .route("/payments", post(billing::record_payment))
        .route("/payments/:id", get(billing::get_payment))
        .route("/payments/:id", delete(billing::reverse_payment))
        .route("/balances", get(billing::student_balances))
        .route("/students/:id/transactions", get(billing::transaction_history))
        .route("/students/:id/invoices", get(billing::student_invoices));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/billing", billing_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            audit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
