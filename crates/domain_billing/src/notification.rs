//! Notification outbox
//!
//! Ledger operations enqueue notifications after their writes commit and
//! return immediately. A detached dispatcher task drains the queue into the
//! [`Notifier`] port; delivery failures are logged and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use core_kernel::{BrokerId, InvoiceId};

use crate::broker::Broker;
use crate::invoice::Invoice;
use crate::payment::Payment;
use crate::ports::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InvoiceCreated,
    PaymentReceived,
    OverdueInvoices,
}

/// A message for one broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub broker_id: BrokerId,
    /// Delivery address of the broker
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Invoices the message is about
    pub invoice_ids: Vec<InvoiceId>,
}

impl Notification {
    pub fn invoice_created(broker: &Broker, invoice: &Invoice) -> Self {
        let body = format!(
            "Dear {},\n\nInvoice {} for {} has been issued and is due on {}.\n{}",
            contact_name(broker),
            invoice.number,
            invoice.amount.round_to_currency(),
            invoice.due_date.format("%Y-%m-%d"),
            invoice.description,
        );
        Self {
            kind: NotificationKind::InvoiceCreated,
            broker_id: broker.id,
            recipient: broker.email.clone(),
            subject: format!("New invoice {} - {}", invoice.number, broker.company_name),
            body,
            invoice_ids: vec![invoice.id],
        }
    }

    pub fn payment_received(broker: &Broker, payment: &Payment, invoice: &Invoice) -> Self {
        let body = format!(
            "Dear {},\n\nWe received {} on {} via {} for invoice {}.\nRemaining balance: {}.",
            contact_name(broker),
            payment.amount.round_to_currency(),
            payment.payment_date.format("%Y-%m-%d"),
            payment.method,
            invoice.number,
            invoice.remaining().round_to_currency(),
        );
        Self {
            kind: NotificationKind::PaymentReceived,
            broker_id: broker.id,
            recipient: broker.email.clone(),
            subject: format!(
                "Payment received for invoice {} - {}",
                invoice.number, broker.company_name
            ),
            body,
            invoice_ids: vec![invoice.id],
        }
    }

    /// One message bundling every overdue invoice of `broker`
    pub fn overdue(broker: &Broker, invoices: &[Invoice], now: DateTime<Utc>) -> Self {
        let mut body = format!(
            "Dear {},\n\nThe following invoices are past due:\n",
            contact_name(broker)
        );
        for invoice in invoices {
            let days = (now - invoice.due_date).num_days();
            // writing to a String cannot fail
            let _ = writeln!(
                body,
                "- {}: {} outstanding, due {} ({} days overdue)",
                invoice.number,
                invoice.remaining().round_to_currency(),
                invoice.due_date.format("%Y-%m-%d"),
                days,
            );
        }
        Self {
            kind: NotificationKind::OverdueInvoices,
            broker_id: broker.id,
            recipient: broker.email.clone(),
            subject: format!("Overdue invoices notice - {}", broker.company_name),
            body,
            invoice_ids: invoices.iter().map(|i| i.id).collect(),
        }
    }
}

fn contact_name(broker: &Broker) -> &str {
    if broker.contact_person.is_empty() {
        &broker.company_name
    } else {
        &broker.contact_person
    }
}

/// Sending half of the notification queue
#[derive(Debug, Clone)]
pub struct NotificationOutbox {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationOutbox {
    /// Creates an outbox and the receiver a dispatcher should drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Creates an outbox wired to a dispatcher task delivering into `notifier`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        let (outbox, rx) = Self::channel();
        let handle = NotificationDispatcher::new(rx, notifier).spawn();
        (outbox, handle)
    }

    /// Hands a notification off; never fails the caller
    pub fn enqueue(&self, notification: Notification) {
        let kind = notification.kind;
        if self.tx.send(notification).is_err() {
            warn!(?kind, "notification dropped: dispatcher is not running");
        }
    }
}

/// Drains the queue into the notifier until every outbox is dropped
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(rx: mpsc::UnboundedReceiver<Notification>, notifier: Arc<dyn Notifier>) -> Self {
        Self { rx, notifier }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            let kind = notification.kind;
            let recipient = notification.recipient.clone();
            match self.notifier.notify(notification).await {
                Ok(()) => debug!(?kind, %recipient, "notification delivered"),
                Err(error) => warn!(?kind, %recipient, %error, "notification delivery failed"),
            }
        }
        debug!("notification dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_kernel::{DomainPort, PortError};
    use tokio::sync::Mutex;

    struct FlakyNotifier {
        seen: Mutex<Vec<NotificationKind>>,
    }

    impl DomainPort for FlakyNotifier {}

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, notification: Notification) -> Result<(), PortError> {
            self.seen.lock().await.push(notification.kind);
            if notification.kind == NotificationKind::InvoiceCreated {
                return Err(PortError::unavailable("smtp unreachable"));
            }
            Ok(())
        }
    }

    fn sample(kind: NotificationKind) -> Notification {
        Notification {
            kind,
            broker_id: BrokerId::new(),
            recipient: "ap@acme.test".to_string(),
            subject: String::new(),
            body: String::new(),
            invoice_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_dispatch() {
        let notifier = Arc::new(FlakyNotifier { seen: Mutex::new(Vec::new()) });
        let (outbox, handle) = NotificationOutbox::start(notifier.clone());

        outbox.enqueue(sample(NotificationKind::InvoiceCreated));
        outbox.enqueue(sample(NotificationKind::PaymentReceived));
        drop(outbox);
        handle.await.unwrap();

        assert_eq!(
            *notifier.seen.lock().await,
            vec![NotificationKind::InvoiceCreated, NotificationKind::PaymentReceived]
        );
    }

    #[test]
    fn test_enqueue_without_dispatcher_is_silent() {
        let (outbox, rx) = NotificationOutbox::channel();
        drop(rx);
        outbox.enqueue(sample(NotificationKind::OverdueInvoices));
    }
}
