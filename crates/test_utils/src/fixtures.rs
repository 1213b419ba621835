//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the billing entities. Fixtures are fixed
//! values so scenario tests stay predictable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{
    BrokerId, Currency, DomainPort, FixedClock, InvoiceId, LoadId, Money, OperationContext,
    PortError, Role,
};
use domain_billing::{Address, Location, Notification, Notifier, Route};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical linehaul invoice amount
    pub fn usd_invoice() -> Money {
        Money::new(dec!(1500.00), Currency::USD)
    }

    /// A partial payment against [`MoneyFixtures::usd_invoice`]
    pub fn usd_partial_payment() -> Money {
        Money::new(dec!(500.00), Currency::USD)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// A EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }

    pub fn rub_invoice() -> Money {
        Money::new(dec!(120000.00), Currency::RUB)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The instant scenario tests start at (Mar 15, 2026 noon UTC)
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    /// A clock frozen at [`TemporalFixtures::now`]
    pub fn clock() -> FixedClock {
        FixedClock::new(Self::now())
    }

    /// Due date thirty days out
    pub fn net_30() -> DateTime<Utc> {
        Self::now() + Duration::days(30)
    }

    /// Due date that has already passed
    pub fn past_due() -> DateTime<Utc> {
        Self::now() - Duration::days(10)
    }

    pub fn start_of_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    pub fn last_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn broker_id() -> BrokerId {
        BrokerId::new()
    }

    pub fn invoice_id() -> InvoiceId {
        InvoiceId::new()
    }

    pub fn load_id() -> LoadId {
        LoadId::new()
    }
}

/// Fixture for addresses and routes
pub struct PlaceFixtures;

impl PlaceFixtures {
    pub fn office() -> Address {
        Address {
            street: "1200 Commerce St".to_string(),
            city: "Dallas".to_string(),
            state: "TX".to_string(),
            country: "US".to_string(),
            zip_code: "75202".to_string(),
        }
    }

    pub fn location(city: &str, state: &str) -> Location {
        Location {
            address: format!("100 Main St, {city}"),
            city: city.to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    /// Dallas, TX to Denver, CO
    pub fn dallas_to_denver() -> Route {
        Route {
            origin: Self::location("Dallas", "TX"),
            destination: Self::location("Denver", "CO"),
        }
    }
}

/// Fixture for operation contexts
pub struct ContextFixtures;

impl ContextFixtures {
    pub fn operator() -> OperationContext {
        OperationContext::new("ops@example.com", Role::Operator)
    }

    pub fn admin() -> OperationContext {
        OperationContext::new("admin@example.com", Role::Admin)
    }

    pub fn viewer() -> OperationContext {
        OperationContext::new("viewer@example.com", Role::Viewer)
    }
}

/// Notifier that keeps every delivered notification in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far, oldest first
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        self.delivered
            .lock()
            .map_err(|_| PortError::internal("recording notifier poisoned"))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_fixtures() {
        assert_eq!(MoneyFixtures::usd_invoice().amount(), dec!(1500.00));
        assert!(MoneyFixtures::usd_zero().is_zero());
        assert_eq!(MoneyFixtures::eur_100().currency(), Currency::EUR);
    }

    #[test]
    fn test_temporal_fixtures_ordering() {
        assert!(TemporalFixtures::past_due() < TemporalFixtures::now());
        assert!(TemporalFixtures::net_30() > TemporalFixtures::now());
        assert!(TemporalFixtures::last_month() < TemporalFixtures::start_of_month());
    }

    #[test]
    fn test_route_fixture() {
        let route = PlaceFixtures::dallas_to_denver();
        assert_eq!(route.origin.state, "TX");
        assert_eq!(route.destination.city, "Denver");
    }

    #[test]
    fn test_context_roles() {
        assert!(ContextFixtures::admin().is_admin());
        assert!(!ContextFixtures::operator().is_admin());
    }

    #[tokio::test]
    async fn test_recording_notifier_sees_dispatched_messages() {
        use domain_billing::{NotificationKind, NotificationOutbox};

        let notifier = RecordingNotifier::new();
        let (outbox, handle) = NotificationOutbox::start(Arc::new(notifier.clone()));
        outbox.enqueue(Notification {
            kind: NotificationKind::OverdueInvoices,
            broker_id: IdFixtures::broker_id(),
            recipient: "billing@acme-freight.example".to_string(),
            subject: "Overdue invoices notice - Acme Freight".to_string(),
            body: String::new(),
            invoice_ids: Vec::new(),
        });
        drop(outbox);
        handle.await.unwrap();

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, NotificationKind::OverdueInvoices);
    }
}
