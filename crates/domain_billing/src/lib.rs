//! Billing Domain - Freight Billing Reconciliation
//!
//! This crate holds the billing core of the freight system: brokers, the
//! invoices issued to them, the payments received against those invoices,
//! and the loads that invoices cover.
//!
//! # Components
//!
//! - [`BillingLedger`]: invoice/payment state machine. Every payment write
//!   is followed by a recompute of the target invoice from its payments.
//! - [`LoadReconciler`]: load lifecycle plus the unbilled-load join
//! - [`BrokerRegistry`]: broker records and search
//! - [`MetricsRollup`]: dashboard and per-broker figures
//! - [`NotificationOutbox`]: fire-and-forget email notifications
//!
//! Storage sits behind the [`DocumentCollection`] port. The in-memory
//! adapter in [`adapters`] serves tests and local runs; `infra_db` provides
//! the PostgreSQL one.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingLedger, InvoiceDraft, PaymentDraft};
//!
//! let invoice = ledger.create_invoice(&ctx, invoice_draft).await?;
//! ledger.record_payment(&ctx, payment_draft).await?;
//!
//! // 400 of 1000 received
//! let view = ledger.get_invoice(invoice.id).await?;
//! assert_eq!(view.invoice.status, InvoiceStatus::Partial);
//! ```

pub mod adapters;
pub mod broker;
pub mod brokers;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod load;
pub mod metrics;
pub mod notification;
pub mod numbering;
pub mod payment;
pub mod ports;
pub mod query;
pub mod reconciliation;

pub use broker::{Address, Broker, BrokerDraft, BrokerStatus};
pub use brokers::BrokerRegistry;
pub use error::{BillingError, BillingResult};
pub use invoice::{Invoice, InvoiceDraft, InvoiceStatus, InvoiceView};
pub use ledger::{BillingLedger, SweepReport, BATCH_LIMIT};
pub use load::{DriverInfo, Load, LoadDraft, LoadStatus, LoadView, Location, Route};
pub use metrics::{BrokerStats, DashboardMetrics, MetricsRollup, RollupConfig};
pub use notification::{Notification, NotificationKind, NotificationOutbox};
pub use payment::{Payment, PaymentDraft, PaymentMethod, PaymentView};
pub use ports::{Document, DocumentCollection, Notifier, Stores};
pub use query::{
    BrokerCriteria, InvoiceCriteria, LoadCriteria, Page, PageRequest, Pagination, PaymentCriteria,
};
pub use reconciliation::LoadReconciler;
