//! PostgreSQL document store tests
//!
//! Each test starts its own PostgreSQL container, so they are ignored by
//! default. Run with `cargo test -p infra_db -- --ignored` where Docker is
//! available.

use std::sync::Arc;

use chrono::Duration;
use core_kernel::{Clock, PortError};
use rust_decimal_macros::dec;

use domain_billing::{
    BillingLedger, BrokerRegistry, DocumentCollection, Invoice, InvoiceStatus, LoadReconciler,
    MetricsRollup, NotificationOutbox, PageRequest, Stores,
};
use infra_db::PostgresDocumentStore;
use test_utils::{
    assert_invoice_consistent, assert_invoice_state, create_isolated_test_database, count_rows,
    BrokerDraftBuilder, ContextFixtures, InvoiceDraftBuilder, LoadDraftBuilder,
    PaymentDraftBuilder, TemporalFixtures, TestDatabase,
};

struct Services {
    store: Arc<PostgresDocumentStore>,
    ledger: BillingLedger,
    loads: LoadReconciler,
    brokers: BrokerRegistry,
    metrics: MetricsRollup,
}

fn services(db: &TestDatabase) -> Services {
    let store = Arc::new(PostgresDocumentStore::new(db.pool().clone()));
    let stores = Stores::from_backend(store.clone());
    let clock: Arc<dyn Clock> = Arc::new(TemporalFixtures::clock());
    let (outbox, _rx) = NotificationOutbox::channel();
    Services {
        ledger: BillingLedger::new(stores.clone(), outbox, clock.clone()),
        loads: LoadReconciler::new(stores.clone(), clock.clone()),
        brokers: BrokerRegistry::new(stores.clone(), clock.clone()),
        metrics: MetricsRollup::new(stores, clock),
        store,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_broker_round_trip_and_search() {
    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);
    let ctx = ContextFixtures::operator();

    let acme = s
        .brokers
        .create_broker(&ctx, BrokerDraftBuilder::new().build())
        .await
        .unwrap();
    s.brokers
        .create_broker(&ctx, BrokerDraftBuilder::new().with_company_name("Blue Line").build())
        .await
        .unwrap();

    let loaded = s.brokers.get_broker(acme.id).await.unwrap();
    assert_eq!(loaded, acme);

    let found = s.brokers.search_brokers("ACME", PageRequest::default()).await.unwrap();
    assert_eq!(found.pagination.total, 1);
    assert_eq!(found.items[0].id, acme.id);
    assert_eq!(count_rows(db.pool(), "brokers").await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_payments_drive_invoice_status() {
    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);
    let ctx = ContextFixtures::operator();
    let broker = s
        .brokers
        .create_broker(&ctx, BrokerDraftBuilder::new().build())
        .await
        .unwrap();

    let invoice = s
        .ledger
        .create_invoice(&ctx, InvoiceDraftBuilder::new(broker.id).build())
        .await
        .unwrap();
    assert_eq!(invoice.number, "INV-202603-0001");

    s.ledger
        .record_payment(&ctx, PaymentDraftBuilder::new(invoice.id, broker.id).build())
        .await
        .unwrap();
    let view = s.ledger.get_invoice(invoice.id).await.unwrap();
    assert_invoice_state(&view.invoice, InvoiceStatus::Partial, dec!(500.00));

    s.ledger
        .record_payment(
            &ctx,
            PaymentDraftBuilder::new(invoice.id, broker.id)
                .with_amount(core_kernel::Money::new(dec!(1000.00), core_kernel::Currency::USD))
                .build(),
        )
        .await
        .unwrap();
    let view = s.ledger.get_invoice(invoice.id).await.unwrap();
    assert_invoice_state(&view.invoice, InvoiceStatus::Paid, dec!(1500.00));
    assert_invoice_consistent(&view.invoice);

    let second = s
        .ledger
        .create_invoice(&ctx, InvoiceDraftBuilder::new(broker.id).build())
        .await
        .unwrap();
    assert_eq!(second.number, "INV-202603-0002");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unbilled_join_runs_in_sql() {
    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);
    let ctx = ContextFixtures::operator();
    let broker = s
        .brokers
        .create_broker(&ctx, BrokerDraftBuilder::new().build())
        .await
        .unwrap();
    let open = s
        .ledger
        .create_invoice(&ctx, InvoiceDraftBuilder::new(broker.id).build())
        .await
        .unwrap();
    let canceled = s
        .ledger
        .create_invoice(&ctx, InvoiceDraftBuilder::new(broker.id).build())
        .await
        .unwrap();
    s.ledger.cancel_invoice(&ctx, canceled.id).await.unwrap();

    let loose = s
        .loads
        .create_load(&ctx, LoadDraftBuilder::new(broker.id).build())
        .await
        .unwrap();
    assert_eq!(loose.number, "LD-20260315-001");
    s.loads
        .create_load(&ctx, LoadDraftBuilder::new(broker.id).with_invoice(open.id).build())
        .await
        .unwrap();
    s.loads
        .create_load(&ctx, LoadDraftBuilder::new(broker.id).with_invoice(canceled.id).build())
        .await
        .unwrap();

    let page = s.loads.unbilled_loads(broker.id, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 2);

    let stats = s.metrics.broker_stats(broker.id).await.unwrap();
    assert_eq!(stats.total_loads, 3);
    assert_eq!(stats.unbilled_loads, 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_overdue_counts_use_due_date() {
    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);
    let ctx = ContextFixtures::operator();
    let broker = s
        .brokers
        .create_broker(&ctx, BrokerDraftBuilder::new().build())
        .await
        .unwrap();
    s.ledger
        .create_invoice(
            &ctx,
            InvoiceDraftBuilder::new(broker.id)
                .with_due_date(TemporalFixtures::now() - Duration::days(3))
                .build(),
        )
        .await
        .unwrap();
    s.ledger
        .create_invoice(&ctx, InvoiceDraftBuilder::new(broker.id).build())
        .await
        .unwrap();

    let overdue = s.ledger.overdue_invoices(PageRequest::default()).await.unwrap();
    assert_eq!(overdue.pagination.total, 1);

    let dashboard = s.metrics.dashboard().await.unwrap();
    assert_eq!(dashboard.overdue_invoices, 1);
    assert_eq!(dashboard.total_debt, dec!(3000.00));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_missing_rows_are_not_found() {
    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);

    let id = core_kernel::InvoiceId::new();
    let found = DocumentCollection::<Invoice>::find_by_id(s.store.as_ref(), id)
        .await
        .unwrap();
    assert!(found.is_none());

    let error = DocumentCollection::<Invoice>::delete(s.store.as_ref(), id)
        .await
        .unwrap_err();
    assert!(matches!(error, PortError::NotFound { .. }));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_health_check_reports_healthy() {
    use core_kernel::{AdapterHealth, HealthCheckable};

    let db = create_isolated_test_database().await.unwrap();
    let s = services(&db);
    let result = s.store.health_check().await;
    assert_eq!(result.status, AdapterHealth::Healthy);
    assert_eq!(result.adapter_id, "postgres-document-store");
}
