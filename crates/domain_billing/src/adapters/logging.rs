//! Notifier that only records deliveries in the log

use async_trait::async_trait;
use tracing::info;

use core_kernel::{DomainPort, PortError};

use crate::notification::Notification;
use crate::ports::Notifier;

/// Logs each notification at `info` instead of delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl DomainPort for LoggingNotifier {}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        info!(
            kind = ?notification.kind,
            recipient = %notification.recipient,
            subject = %notification.subject,
            invoices = notification.invoice_ids.len(),
            "delivery backend not configured, notification logged only"
        );
        Ok(())
    }
}
