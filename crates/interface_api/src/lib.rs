//! HTTP API Layer
//!
//! This crate provides the REST API for the freight billing core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for each resource
//! - **Middleware**: Bearer-token authentication, audit logging
//! - **DTOs**: Query parameters and response envelopes
//! - **Error Handling**: `BillingError` mapped onto status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(config, stores, outbox, clock, store_health);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use core_kernel::{Clock, HealthCheckable};
use domain_billing::{
    BillingLedger, BrokerRegistry, LoadReconciler, MetricsRollup, NotificationOutbox, Stores,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, brokers, dashboard, health, invoices, loads, payments};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub ledger: BillingLedger,
    pub loads: LoadReconciler,
    pub brokers: BrokerRegistry,
    pub metrics: MetricsRollup,
    pub store_health: Arc<dyn HealthCheckable>,
}

impl AppState {
    /// Wires the billing services over one set of stores
    pub fn new(
        config: ApiConfig,
        stores: Stores,
        outbox: NotificationOutbox,
        clock: Arc<dyn Clock>,
        store_health: Arc<dyn HealthCheckable>,
    ) -> Self {
        Self {
            config,
            ledger: BillingLedger::new(stores.clone(), outbox, clock.clone()),
            loads: LoadReconciler::new(stores.clone(), clock.clone()),
            brokers: BrokerRegistry::new(stores.clone(), clock.clone()),
            metrics: MetricsRollup::new(stores, clock),
            store_health,
        }
    }
}

/// Creates the main API router
///
/// Everything under `/api/v1` requires a bearer token; `/health` and
/// `/health/ready` are public.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let broker_routes = Router::new()
        .route("/", get(brokers::list_brokers).post(brokers::create_broker))
        .route("/search", get(brokers::search_brokers))
        .route(
            "/:id",
            get(brokers::get_broker)
                .put(brokers::update_broker)
                .delete(brokers::delete_broker),
        )
        .route("/:id/stats", get(brokers::broker_stats))
        .route("/:id/invoices", get(brokers::broker_invoices))
        .route("/:id/payments", get(brokers::broker_payments))
        .route("/:id/loads/unbilled", get(brokers::broker_unbilled_loads));

    let invoice_routes = Router::new()
        .route("/", get(invoices::list_invoices).post(invoices::create_invoice))
        .route("/overdue", get(invoices::overdue_invoices))
        .route("/status/:status", get(invoices::invoices_by_status))
        .route(
            "/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/:id/cancel", post(invoices::cancel_invoice))
        .route("/:id/recompute", post(invoices::recompute_invoice))
        .route("/:id/payments", get(invoices::invoice_payments))
        .route("/:id/loads", get(invoices::invoice_loads));

    let payment_routes = Router::new()
        .route("/", get(payments::list_payments).post(payments::record_payment))
        .route(
            "/:id",
            get(payments::get_payment)
                .put(payments::update_payment)
                .delete(payments::delete_payment),
        );

    let load_routes = Router::new()
        .route("/", get(loads::list_loads).post(loads::create_load))
        .route(
            "/:id",
            get(loads::get_load)
                .put(loads::update_load)
                .delete(loads::delete_load),
        )
        .route("/:id/status", put(loads::update_load_status));

    let api_routes = Router::new()
        .route("/dashboard/metrics", get(dashboard::dashboard_metrics))
        .nest("/brokers", broker_routes)
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .nest("/loads", load_routes)
        .route(
            "/admin/send-overdue-notifications",
            post(admin::send_overdue_notifications),
        )
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

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
