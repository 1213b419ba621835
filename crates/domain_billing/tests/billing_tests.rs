//! Scenario tests for domain_billing against the in-memory store

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use core_kernel::{BrokerId, Clock, FixedClock, InvoiceId, OperationContext, Role};

use domain_billing::adapters::InMemoryDocumentStore;
use domain_billing::load::LoadStatus;
use domain_billing::query::{UNKNOWN_BROKER, UNKNOWN_INVOICE};
use domain_billing::{
    Address, BillingError, BillingLedger, BrokerDraft, BrokerRegistry, InvoiceCriteria,
    InvoiceDraft, InvoiceStatus, LoadDraft, LoadReconciler, Location, MetricsRollup, Notification,
    NotificationKind, NotificationOutbox, PageRequest, PaymentDraft, Route, Stores,
};

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    store: Arc<InMemoryDocumentStore>,
    clock: FixedClock,
    ledger: BillingLedger,
    loads: LoadReconciler,
    brokers: BrokerRegistry,
    metrics: MetricsRollup,
    outbox: UnboundedReceiver<Notification>,
    ctx: OperationContext,
}

fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryDocumentStore::new());
    let stores = Stores::from_backend(store.clone());
    let clock = FixedClock::new(start_of_test());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let (outbox, rx) = NotificationOutbox::channel();
    Harness {
        ledger: BillingLedger::new(stores.clone(), outbox, shared.clone()),
        loads: LoadReconciler::new(stores.clone(), shared.clone()),
        brokers: BrokerRegistry::new(stores.clone(), shared.clone()),
        metrics: MetricsRollup::new(stores, shared),
        store,
        clock,
        outbox: rx,
        ctx: OperationContext::new("ops@example.com", Role::Operator),
    }
}

fn broker_draft(name: &str) -> BrokerDraft {
    BrokerDraft {
        company_name: name.to_string(),
        contact_person: "Dana Reyes".to_string(),
        email: format!("billing@{}.example", name.to_lowercase().replace(' ', "-")),
        phone: "+1 555 0100".to_string(),
        address: Address::default(),
        credit_limit: dec!(50000),
        reliability_score: dec!(8),
        status: None,
        notes: String::new(),
    }
}

fn invoice_draft(broker_id: BrokerId, amount: Decimal, due: DateTime<Utc>) -> InvoiceDraft {
    InvoiceDraft {
        broker_id: Some(broker_id),
        amount,
        currency: "USD".to_string(),
        due_date: Some(due),
        description: "Linehaul".to_string(),
        ..Default::default()
    }
}

fn payment_draft(broker_id: BrokerId, invoice_id: InvoiceId, amount: Decimal) -> PaymentDraft {
    PaymentDraft {
        invoice_id: Some(invoice_id),
        broker_id: Some(broker_id),
        amount,
        currency: "USD".to_string(),
        method: "wire_transfer".to_string(),
        ..Default::default()
    }
}

fn location(city: &str, state: &str) -> Location {
    Location {
        address: "1 Dock Rd".to_string(),
        city: city.to_string(),
        state: state.to_string(),
        ..Default::default()
    }
}

fn load_draft(broker_id: BrokerId, invoice_id: Option<InvoiceId>) -> LoadDraft {
    LoadDraft {
        broker_id: Some(broker_id),
        invoice_id,
        route: Route {
            origin: location("Dallas", "TX"),
            destination: location("Denver", "CO"),
        },
        cost: dec!(1800),
        currency: "USD".to_string(),
        ..Default::default()
    }
}

fn validation_message(error: BillingError) -> String {
    match error {
        BillingError::Validation(message) => message,
        other => panic!("expected validation error, got {other:?}"),
    }
}

fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

// ============================================================================
// Ledger
// ============================================================================

mod ledger_tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let mut h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.number, "INV-202603-0001");

        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(400)))
            .await
            .unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.status, InvoiceStatus::Partial);
        assert_eq!(view.invoice.paid_amount.amount(), dec!(400));
        assert_eq!(view.remaining_amount.amount(), dec!(600));
        assert!(view.invoice.paid_at.is_none());

        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(600)))
            .await
            .unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.status, InvoiceStatus::Paid);
        assert_eq!(view.invoice.paid_at, Some(h.clock.now()));
        assert!(view.remaining_amount.is_zero());

        let error = h
            .ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Payment amount exceeds remaining balance");

        let kinds: Vec<NotificationKind> = drain(&mut h.outbox).iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::InvoiceCreated,
                NotificationKind::PaymentReceived,
                NotificationKind::PaymentReceived,
            ]
        );
    }

    #[tokio::test]
    async fn test_payment_rules_against_invoice() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let other = h.brokers.create_broker(&h.ctx, broker_draft("Blue Line")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();

        let wrong_currency = PaymentDraft {
            currency: "EUR".to_string(),
            ..payment_draft(broker.id, invoice.id, dec!(10))
        };
        assert_eq!(
            validation_message(h.ledger.record_payment(&h.ctx, wrong_currency).await.unwrap_err()),
            "Payment currency must match invoice currency"
        );
        assert_eq!(
            validation_message(
                h.ledger
                    .record_payment(&h.ctx, payment_draft(other.id, invoice.id, dec!(10)))
                    .await
                    .unwrap_err()
            ),
            "Payment broker must match invoice broker"
        );
        assert_eq!(
            validation_message(
                h.ledger
                    .record_payment(&h.ctx, payment_draft(broker.id, InvoiceId::new_v7(), dec!(10)))
                    .await
                    .unwrap_err()
            ),
            "Invoice not found"
        );

        h.ledger.cancel_invoice(&h.ctx, invoice.id).await.unwrap();
        assert_eq!(
            validation_message(
                h.ledger
                    .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(10)))
                    .await
                    .unwrap_err()
            ),
            "Cannot record payment against a canceled invoice"
        );
    }

    #[tokio::test]
    async fn test_amounts_that_round_to_zero_are_rejected() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);

        let error = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(0.00001), due))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Invoice amount must be greater than zero");

        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        let error = h
            .ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(0.00001)))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Payment amount must be greater than zero");
        assert!(h.ledger.payments_for_invoice(invoice.id).await.unwrap().is_empty());

        let tiny_load = LoadDraft {
            cost: dec!(0.00001),
            ..load_draft(broker.id, None)
        };
        let error = h.loads.create_load(&h.ctx, tiny_load).await.unwrap_err();
        assert_eq!(validation_message(error), "Cost must be greater than zero");
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        h.ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();

        let page = h
            .ledger
            .invoices_by_broker(broker.id, PageRequest::new(i64::MAX, 20))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 1);
        assert!(!page.pagination.has_next);
        assert!(page.pagination.has_prev);
    }

    #[tokio::test]
    async fn test_update_payment_excludes_itself() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        let payment = h
            .ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(900)))
            .await
            .unwrap();

        // 900 already collected would reject 950 unless the edited payment is left out
        h.ledger
            .update_payment(&h.ctx, payment.id, payment_draft(broker.id, invoice.id, dec!(950)))
            .await
            .unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.paid_amount.amount(), dec!(950));
        assert_eq!(view.invoice.status, InvoiceStatus::Partial);

        h.ledger.delete_payment(&h.ctx, payment.id).await.unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.paid_amount.amount(), Decimal::ZERO);
        assert_eq!(view.invoice.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn test_paid_at_cleared_when_payment_removed() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(500), due))
            .await
            .unwrap();
        let payment = h
            .ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(500)))
            .await
            .unwrap();
        assert!(h.ledger.get_invoice(invoice.id).await.unwrap().invoice.paid_at.is_some());

        h.ledger.delete_payment(&h.ctx, payment.id).await.unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.status, InvoiceStatus::Pending);
        assert!(view.invoice.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(250)))
            .await
            .unwrap();

        let first = h.ledger.recompute_invoice(invoice.id).await.unwrap();
        h.clock.advance(Duration::minutes(5));
        let second = h.ledger.recompute_invoice(invoice.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_canceled_invoice_is_never_rederived() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(3);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        h.ledger.cancel_invoice(&h.ctx, invoice.id).await.unwrap();

        h.clock.advance(Duration::days(10));
        let recomputed = h.ledger.recompute_invoice(invoice.id).await.unwrap();
        assert_eq!(recomputed.status, InvoiceStatus::Canceled);

        // cancel is idempotent
        let again = h.ledger.cancel_invoice(&h.ctx, invoice.id).await.unwrap();
        assert_eq!(again.status, InvoiceStatus::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_and_delete_guards() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(300), due))
            .await
            .unwrap();
        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(300)))
            .await
            .unwrap();

        assert_eq!(
            validation_message(h.ledger.cancel_invoice(&h.ctx, invoice.id).await.unwrap_err()),
            "Cannot cancel a paid invoice"
        );
        assert_eq!(
            validation_message(h.ledger.delete_invoice(&h.ctx, invoice.id).await.unwrap_err()),
            "Cannot delete invoice with existing payments"
        );
    }

    #[tokio::test]
    async fn test_invoice_edit_after_payment() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();
        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(600)))
            .await
            .unwrap();

        let error = h
            .ledger
            .update_invoice(&h.ctx, invoice.id, invoice_draft(broker.id, dec!(500), due))
            .await
            .unwrap_err();
        assert_eq!(
            validation_message(error),
            "Invoice amount cannot be less than the amount already paid"
        );

        // shrinking to exactly the collected amount settles the invoice
        let updated = h
            .ledger
            .update_invoice(&h.ctx, invoice.id, invoice_draft(broker.id, dec!(600), due))
            .await
            .unwrap();
        assert_eq!(updated.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_invoice_requires_existing_broker() {
        let h = harness();
        let due = h.clock.now() + Duration::days(30);
        let error = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(BrokerId::new_v7(), dec!(100), due))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Broker not found");
    }

    #[tokio::test]
    async fn test_missing_invoice_is_not_found() {
        let h = harness();
        let error = h.ledger.get_invoice(InvoiceId::new_v7()).await.unwrap_err();
        assert!(matches!(error, BillingError::NotFound { entity: "Invoice", .. }));
    }
}

// ============================================================================
// Numbering
// ============================================================================

mod numbering_tests {
    use super::*;

    #[tokio::test]
    async fn test_invoice_numbers_reset_each_month() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(90);

        let mut numbers = Vec::new();
        for _ in 0..2 {
            let invoice = h
                .ledger
                .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(100), due))
                .await
                .unwrap();
            numbers.push(invoice.number);
            h.clock.advance(Duration::minutes(1));
        }
        h.clock.set(Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap());
        let april = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(100), due))
            .await
            .unwrap();
        numbers.push(april.number);

        assert_eq!(numbers, vec!["INV-202603-0001", "INV-202603-0002", "INV-202604-0001"]);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_generation() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        h.store.set_unreachable("invoices", true).await;

        let due = h.clock.now() + Duration::days(30);
        let error = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(100), due))
            .await
            .unwrap_err();
        assert!(matches!(error, BillingError::Generation(_)));
    }

    #[tokio::test]
    async fn test_load_numbers_are_daily() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let first = h.loads.create_load(&h.ctx, load_draft(broker.id, None)).await.unwrap();
        let second = h.loads.create_load(&h.ctx, load_draft(broker.id, None)).await.unwrap();
        assert_eq!(first.number, "LD-20260315-001");
        assert_eq!(second.number, "LD-20260315-002");
    }
}

// ============================================================================
// Overdue sweep
// ============================================================================

mod overdue_tests {
    use super::*;

    #[tokio::test]
    async fn test_past_due_invoice_becomes_overdue() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(10);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(1000), due))
            .await
            .unwrap();

        h.clock.advance(Duration::days(11));
        let overdue = h.ledger.overdue_invoices(PageRequest::default()).await.unwrap();
        assert_eq!(overdue.pagination.total, 1);
        assert!(overdue.items[0].is_overdue);

        let refreshed = h.ledger.recompute_invoice(invoice.id).await.unwrap();
        assert_eq!(refreshed.status, InvoiceStatus::Overdue);

        // a partial payment on an overdue invoice reads as partial
        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, dec!(100)))
            .await
            .unwrap();
        let view = h.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(view.invoice.status, InvoiceStatus::Partial);
        assert!(view.is_overdue);
    }

    #[tokio::test]
    async fn test_sweep_groups_by_broker() {
        let mut h = harness();
        let acme = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let blue = h.brokers.create_broker(&h.ctx, broker_draft("Blue Line")).await.unwrap();
        let soon = h.clock.now() + Duration::days(1);
        let later = h.clock.now() + Duration::days(60);
        for (broker, due) in [(acme.id, soon), (acme.id, soon), (blue.id, soon), (blue.id, later)] {
            h.ledger
                .create_invoice(&h.ctx, invoice_draft(broker, dec!(200), due))
                .await
                .unwrap();
        }
        drain(&mut h.outbox);

        h.clock.advance(Duration::days(2));
        let admin = OperationContext::new("root", Role::Admin);
        let report = h.ledger.send_overdue_notifications(&admin).await.unwrap();
        assert_eq!(report.invoices, 3);
        assert_eq!(report.refreshed, 3);
        assert_eq!(report.brokers_notified, 2);
        assert_eq!(report.brokers_skipped, 0);

        let sent = drain(&mut h.outbox);
        assert_eq!(sent.len(), 2);
        let acme_notice = sent.iter().find(|n| n.broker_id == acme.id).unwrap();
        assert_eq!(acme_notice.kind, NotificationKind::OverdueInvoices);
        assert_eq!(acme_notice.invoice_ids.len(), 2);
        assert_eq!(acme_notice.subject, "Overdue invoices notice - Acme Freight");
        let blue_notice = sent.iter().find(|n| n.broker_id == blue.id).unwrap();
        assert_eq!(blue_notice.invoice_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_requires_admin() {
        let h = harness();
        let error = h.ledger.send_overdue_notifications(&h.ctx).await.unwrap_err();
        assert!(matches!(error, BillingError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_sweep_skips_missing_broker() {
        let mut h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(1);
        h.ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(200), due))
            .await
            .unwrap();
        h.brokers.delete_broker(&h.ctx, broker.id).await.unwrap();
        drain(&mut h.outbox);

        h.clock.advance(Duration::days(2));
        let report = h
            .ledger
            .send_overdue_notifications(&OperationContext::system())
            .await
            .unwrap();
        assert_eq!(report.brokers_notified, 0);
        assert_eq!(report.brokers_skipped, 1);
        assert!(drain(&mut h.outbox).is_empty());
    }

    #[tokio::test]
    async fn test_overdue_criteria_filter() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let soon = h.clock.now() + Duration::days(1);
        let later = h.clock.now() + Duration::days(60);
        h.ledger.create_invoice(&h.ctx, invoice_draft(broker.id, dec!(100), soon)).await.unwrap();
        h.ledger.create_invoice(&h.ctx, invoice_draft(broker.id, dec!(100), later)).await.unwrap();
        h.clock.advance(Duration::days(2));

        let overdue = InvoiceCriteria {
            overdue: Some(true),
            ..Default::default()
        };
        let current = InvoiceCriteria {
            overdue: Some(false),
            ..Default::default()
        };
        let page = PageRequest::default();
        assert_eq!(h.ledger.list_invoices(&overdue, page).await.unwrap().pagination.total, 1);
        assert_eq!(h.ledger.list_invoices(&current, page).await.unwrap().pagination.total, 1);
    }
}

// ============================================================================
// Load reconciliation
// ============================================================================

mod reconciliation_tests {
    use super::*;

    #[tokio::test]
    async fn test_unbilled_loads_join_invoice_status() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let open = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(500), due))
            .await
            .unwrap();
        let settled = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(500), due))
            .await
            .unwrap();
        h.ledger
            .record_payment(&h.ctx, payment_draft(broker.id, settled.id, dec!(500)))
            .await
            .unwrap();

        let loose = h.loads.create_load(&h.ctx, load_draft(broker.id, None)).await.unwrap();
        let on_open = h.loads.create_load(&h.ctx, load_draft(broker.id, Some(open.id))).await.unwrap();
        h.loads.create_load(&h.ctx, load_draft(broker.id, Some(settled.id))).await.unwrap();

        // a zero limit falls back to the unbilled default
        let page = h.loads.unbilled_loads(broker.id, PageRequest::new(1, 0)).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|v| v.load.id).collect();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.limit, 50);
        assert!(ids.contains(&loose.id));
        assert!(ids.contains(&on_open.id));

        let stats = h.metrics.broker_stats(broker.id).await.unwrap();
        assert_eq!(stats.unbilled_loads, 2);
        assert_eq!(stats.total_loads, 3);
    }

    #[tokio::test]
    async fn test_load_must_share_invoice_broker() {
        let h = harness();
        let acme = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let blue = h.brokers.create_broker(&h.ctx, broker_draft("Blue Line")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(acme.id, dec!(500), due))
            .await
            .unwrap();

        let error = h
            .loads
            .create_load(&h.ctx, load_draft(blue.id, Some(invoice.id)))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Load broker must match invoice broker");

        let error = h
            .loads
            .create_load(&h.ctx, load_draft(BrokerId::new_v7(), None))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Broker not found");
    }

    #[tokio::test]
    async fn test_load_status_transition_by_name() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let load = h.loads.create_load(&h.ctx, load_draft(broker.id, None)).await.unwrap();
        assert_eq!(load.status, LoadStatus::Planned);

        let moved = h.loads.update_load_status(&h.ctx, load.id, "delivered").await.unwrap();
        assert_eq!(moved.status, LoadStatus::Delivered);

        let error = h
            .loads
            .update_load_status(&h.ctx, load.id, "teleported")
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "Invalid load status");
    }

    #[tokio::test]
    async fn test_views_fall_back_to_placeholders() {
        let h = harness();
        let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let due = h.clock.now() + Duration::days(30);
        let invoice = h
            .ledger
            .create_invoice(&h.ctx, invoice_draft(broker.id, dec!(500), due))
            .await
            .unwrap();
        let load = h.loads.create_load(&h.ctx, load_draft(broker.id, Some(invoice.id))).await.unwrap();

        let view = h.loads.get_load(load.id).await.unwrap();
        assert_eq!(view.broker_name, "Acme Freight");
        assert_eq!(view.invoice_number, invoice.number);

        h.ledger.delete_invoice(&h.ctx, invoice.id).await.unwrap();
        h.brokers.delete_broker(&h.ctx, broker.id).await.unwrap();

        let view = h.loads.get_load(load.id).await.unwrap();
        assert_eq!(view.broker_name, UNKNOWN_BROKER);
        assert_eq!(view.invoice_number, UNKNOWN_INVOICE);
    }
}

// ============================================================================
// Metrics
// ============================================================================

mod metrics_tests {
    use super::*;

    #[tokio::test]
    async fn test_dashboard_totals() {
        let h = harness();
        let acme = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
        let blue = h.brokers.create_broker(&h.ctx, broker_draft("Blue Line")).await.unwrap();
        let soon = h.clock.now() + Duration::days(2);
        let later = h.clock.now() + Duration::days(40);

        let a1 = h.ledger.create_invoice(&h.ctx, invoice_draft(acme.id, dec!(1000), soon)).await.unwrap();
        h.ledger.create_invoice(&h.ctx, invoice_draft(acme.id, dec!(300), later)).await.unwrap();
        h.ledger.create_invoice(&h.ctx, invoice_draft(blue.id, dec!(200), later)).await.unwrap();
        h.ledger
            .record_payment(&h.ctx, payment_draft(acme.id, a1.id, dec!(250)))
            .await
            .unwrap();

        h.clock.advance(Duration::days(3));
        let metrics = h.metrics.dashboard().await.unwrap();

        assert_eq!(metrics.total_debt, dec!(1250));
        assert_eq!(metrics.overdue_amount, dec!(750));
        assert_eq!(metrics.paid_this_month, dec!(250));
        assert_eq!(metrics.paid_last_month, Decimal::ZERO);
        assert_eq!(metrics.total_invoices, 3);
        assert_eq!(metrics.overdue_invoices, 1);
        assert_eq!(metrics.pending_invoices, 2);
        assert_eq!(metrics.active_brokers, 2);

        assert_eq!(metrics.top_debtors.len(), 2);
        assert_eq!(metrics.top_debtors[0].broker_name, "Acme Freight");
        assert_eq!(metrics.top_debtors[0].debt, dec!(1050));

        assert_eq!(metrics.payments_by_day.len(), 30);
        let paid_days: Vec<_> = metrics.payments_by_day.iter().filter(|d| d.count > 0).collect();
        assert_eq!(paid_days.len(), 1);
        assert_eq!(paid_days[0].date, start_of_test().date_naive());

        assert_eq!(metrics.revenue_by_month.len(), 12);
        assert_eq!(metrics.revenue_by_month.last().unwrap().month, "2026-03");
        assert_eq!(metrics.revenue_by_month.last().unwrap().amount, dec!(250));

        let statuses: u64 = metrics.invoices_by_status.iter().map(|s| s.count).sum();
        assert_eq!(statuses, 3);
    }

    #[tokio::test]
    async fn test_dashboard_on_empty_store() {
        let h = harness();
        let metrics = h.metrics.dashboard().await.unwrap();
        assert_eq!(metrics.total_debt, Decimal::ZERO);
        assert!(metrics.top_debtors.is_empty());
        assert!(metrics.payments_by_day.iter().all(|d| d.amount.is_zero()));
        assert_eq!(metrics.invoices_by_status.len(), InvoiceStatus::ALL.len());
    }

    #[tokio::test]
    async fn test_broker_stats_for_missing_broker() {
        let h = harness();
        let error = h.metrics.broker_stats(BrokerId::new_v7()).await.unwrap_err();
        assert!(matches!(error, BillingError::NotFound { entity: "Broker", .. }));
    }
}

// ============================================================================
// Settlement properties
// ============================================================================

mod settlement_properties {
    use super::*;
    use proptest::prelude::*;
    use test_utils::{assert_invoice_consistent, assert_invoice_state, installments_strategy};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_installments_settle_invoice((total, installments) in installments_strategy()) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let h = harness();
                let broker = h.brokers.create_broker(&h.ctx, broker_draft("Acme Freight")).await.unwrap();
                let due = h.clock.now() + Duration::days(30);
                let invoice = h
                    .ledger
                    .create_invoice(&h.ctx, invoice_draft(broker.id, total, due))
                    .await
                    .unwrap();

                let mut paid = Decimal::ZERO;
                for amount in &installments {
                    h.ledger
                        .record_payment(&h.ctx, payment_draft(broker.id, invoice.id, *amount))
                        .await
                        .unwrap();
                    paid += *amount;

                    let view = h.ledger.get_invoice(invoice.id).await.unwrap();
                    assert_invoice_consistent(&view.invoice);
                    assert_eq!(view.remaining_amount.amount(), total - paid);
                }

                let settled = h.ledger.get_invoice(invoice.id).await.unwrap().invoice;
                assert_invoice_state(&settled, InvoiceStatus::Paid, total);
            });
        }
    }
}
