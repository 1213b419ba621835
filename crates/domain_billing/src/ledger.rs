//! Billing ledger
//!
//! Owns every write to invoices and payments. Both write paths converge on
//! [`BillingLedger::recompute_invoice`], which rebuilds an invoice's paid
//! amount and status from the full set of its payments. Because recompute
//! always resums from scratch, a crash between a payment write and the
//! following recompute heals on the next recompute.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{BrokerId, Clock, InvoiceId, Money, OperationContext, PaymentId};

use crate::error::{BillingError, BillingResult};
use crate::invoice::{
    derive_status, Invoice, InvoiceDraft, InvoiceField, InvoiceSortKey,
    InvoiceStatus, InvoiceView,
};
use crate::load::LoadCondition;
use crate::notification::{Notification, NotificationOutbox};
use crate::numbering::next_invoice_number;
use crate::payment::{
    Payment, PaymentCondition, PaymentDraft, PaymentSortKey, PaymentView, ValidPaymentDraft,
};
use crate::ports::{require, Stores};
use crate::query::{
    broker_names, invoice_numbers, overdue_filter, paginate, Filter, InvoiceCriteria, Page,
    PageRequest, PaymentCriteria, Sort, Window, DEFAULT_PAGE_SIZE,
};

/// Upper bound on records read by one batch operation
pub const BATCH_LIMIT: u64 = 1000;

/// Outcome of an overdue sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue invoices examined
    pub invoices: usize,
    /// Invoices whose stored status was stale and got rewritten
    pub refreshed: usize,
    /// Brokers a notification was enqueued for
    pub brokers_notified: usize,
    /// Brokers skipped because the broker record is missing
    pub brokers_skipped: usize,
}

/// The invoice/payment state machine
#[derive(Clone)]
pub struct BillingLedger {
    stores: Stores,
    outbox: NotificationOutbox,
    clock: Arc<dyn Clock>,
}

impl BillingLedger {
    /// Creates a ledger over `stores`
    ///
    /// # Arguments
    ///
    /// * `stores` - Broker, invoice, payment and load collections
    /// * `outbox` - Where invoice and payment notifications are queued
    /// * `clock` - Source of "now" for numbering, overdue checks and timestamps
    pub fn new(stores: Stores, outbox: NotificationOutbox, clock: Arc<dyn Clock>) -> Self {
        Self { stores, outbox, clock }
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    /// Issues a new invoice in `pending` with nothing paid
    ///
    /// # Errors
    ///
    /// * `Validation` - the draft breaks a rule or its broker does not exist
    /// * `Generation` - the invoice number could not be allocated
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller))]
    pub async fn create_invoice(
        &self,
        ctx: &OperationContext,
        draft: InvoiceDraft,
    ) -> BillingResult<Invoice> {
        let valid = draft.validate()?;
        let broker = self
            .stores
            .brokers
            .find_by_id(valid.broker_id)
            .await?
            .ok_or_else(|| BillingError::validation("Broker not found"))?;

        let now = self.clock.now();
        let number = next_invoice_number(self.stores.invoices.as_ref(), now).await?;
        let invoice = self
            .stores
            .invoices
            .insert(valid.into_invoice(number, now))
            .await?;

        info!(invoice = %invoice.number, broker = %broker.id, amount = %invoice.amount, "invoice created");
        self.outbox
            .enqueue(Notification::invoice_created(&broker, &invoice));
        Ok(invoice)
    }

    /// Fetches an invoice with its broker name, remaining amount and overdue flag
    ///
    /// # Errors
    ///
    /// * `NotFound` - no invoice has this id
    pub async fn get_invoice(&self, id: InvoiceId) -> BillingResult<InvoiceView> {
        let invoice = require(self.stores.invoices.as_ref(), id).await?;
        let mut views = self.invoice_views(vec![invoice]).await?;
        views
            .pop()
            .ok_or_else(|| BillingError::not_found("Invoice", id))
    }

    /// Replaces the editable fields of an invoice, then recomputes it
    ///
    /// Once payments exist the broker and currency are frozen and the amount
    /// may not drop below what was already collected.
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller, invoice_id = %id))]
    pub async fn update_invoice(
        &self,
        ctx: &OperationContext,
        id: InvoiceId,
        draft: InvoiceDraft,
    ) -> BillingResult<Invoice> {
        let existing = require(self.stores.invoices.as_ref(), id).await?;
        let valid = draft.validate()?;
        if self.stores.brokers.find_by_id(valid.broker_id).await?.is_none() {
            return Err(BillingError::validation("Broker not found"));
        }

        let payment_count = self
            .stores
            .payments
            .count(&Filter::all().with(PaymentCondition::Invoice(id)))
            .await?;
        if payment_count > 0 {
            if valid.amount.currency() != existing.currency() {
                return Err(BillingError::validation(
                    "Cannot change currency of an invoice with payments",
                ));
            }
            if valid.broker_id != existing.broker_id {
                return Err(BillingError::validation(
                    "Cannot change broker of an invoice with payments",
                ));
            }
            let collected = self.collected(id, None).await?;
            if valid.amount.amount() < collected {
                return Err(BillingError::validation(
                    "Invoice amount cannot be less than the amount already paid",
                ));
            }
        }

        let now = self.clock.now();
        self.stores
            .invoices
            .update_fields(id, valid.into_fields(now))
            .await?;
        debug!("invoice fields updated");
        self.recompute_invoice(id).await
    }

    /// Moves an invoice to the terminal `canceled` state
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, invoice_id = %id))]
    pub async fn cancel_invoice(
        &self,
        ctx: &OperationContext,
        id: InvoiceId,
    ) -> BillingResult<Invoice> {
        let invoice = require(self.stores.invoices.as_ref(), id).await?;
        match invoice.status {
            InvoiceStatus::Canceled => Ok(invoice),
            InvoiceStatus::Paid => Err(BillingError::validation("Cannot cancel a paid invoice")),
            _ => {
                let now = self.clock.now();
                let invoice = self
                    .stores
                    .invoices
                    .update_fields(
                        id,
                        vec![
                            InvoiceField::Status(InvoiceStatus::Canceled),
                            InvoiceField::UpdatedAt(now),
                        ],
                    )
                    .await?;
                info!(invoice = %invoice.number, "invoice canceled");
                Ok(invoice)
            }
        }
    }

    /// Deletes an invoice that has no payments
    ///
    /// Loads pointing at the invoice are left in place.
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, invoice_id = %id))]
    pub async fn delete_invoice(&self, ctx: &OperationContext, id: InvoiceId) -> BillingResult<()> {
        let invoice = require(self.stores.invoices.as_ref(), id).await?;
        let payments = self
            .stores
            .payments
            .count(&Filter::all().with(PaymentCondition::Invoice(id)))
            .await?;
        if payments > 0 {
            return Err(BillingError::validation(
                "Cannot delete invoice with existing payments",
            ));
        }

        let loads = self
            .stores
            .loads
            .count(&Filter::all().with(LoadCondition::Invoice(id)))
            .await?;
        if loads > 0 {
            warn!(invoice = %invoice.number, loads, "deleting invoice leaves loads referencing it");
        }

        self.stores.invoices.delete(id).await?;
        info!(invoice = %invoice.number, "invoice deleted");
        Ok(())
    }

    /// Resynchronises `paid_amount`, `status` and `paid_at` from payments
    ///
    /// Canceled invoices are returned untouched. When nothing changed no
    /// write is issued, so repeated calls leave identical stored state.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn recompute_invoice(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let invoice = require(self.stores.invoices.as_ref(), id).await?;
        if invoice.status == InvoiceStatus::Canceled {
            debug!("canceled invoice is not recomputed");
            return Ok(invoice);
        }

        let mut paid = self.collected(id, None).await?;
        if paid > invoice.amount.amount() {
            warn!(
                invoice = %invoice.number,
                collected = %paid,
                amount = %invoice.amount.amount(),
                "collected total exceeds invoice amount, capping paid amount"
            );
            paid = invoice.amount.amount();
        }

        let now = self.clock.now();
        let status = derive_status(invoice.amount.amount(), paid, invoice.due_date, now);
        let paid_amount = Money::new(paid, invoice.currency());
        let paid_at = match (status, invoice.paid_at) {
            (InvoiceStatus::Paid, Some(at)) if invoice.status == InvoiceStatus::Paid => Some(at),
            (InvoiceStatus::Paid, _) => Some(now),
            _ => None,
        };

        if status == invoice.status
            && paid_amount == invoice.paid_amount
            && paid_at == invoice.paid_at
        {
            return Ok(invoice);
        }

        let updated = self
            .stores
            .invoices
            .update_fields(
                id,
                vec![
                    InvoiceField::Status(status),
                    InvoiceField::PaidAmount(paid_amount),
                    InvoiceField::PaidAt(paid_at),
                    InvoiceField::UpdatedAt(now),
                ],
            )
            .await?;
        debug!(from = %invoice.status, to = %status, paid = %paid, "invoice recomputed");
        Ok(updated)
    }

    /// Lists invoices matching `criteria`, newest first
    ///
    /// # Arguments
    ///
    /// * `criteria` - Status, broker, currency, date and amount filters; all optional
    /// * `page` - Requested page; out-of-range values are clamped
    ///
    /// # Returns
    ///
    /// One page of enriched invoices and its pagination metadata
    pub async fn list_invoices(
        &self,
        criteria: &InvoiceCriteria,
        page: PageRequest,
    ) -> BillingResult<Page<InvoiceView>> {
        let filter = criteria.to_filter(self.clock.now());
        let page = paginate(
            self.stores.invoices.as_ref(),
            &filter,
            Sort::desc(InvoiceSortKey::CreatedAt),
            page.normalize(DEFAULT_PAGE_SIZE),
        )
        .await?;
        self.invoice_page(page).await
    }

    /// Invoices in one status, newest first
    pub async fn invoices_by_status(
        &self,
        status: InvoiceStatus,
        page: PageRequest,
    ) -> BillingResult<Page<InvoiceView>> {
        let criteria = InvoiceCriteria {
            statuses: vec![status],
            ..Default::default()
        };
        self.list_invoices(&criteria, page).await
    }

    /// Invoices billed to one broker, newest first
    pub async fn invoices_by_broker(
        &self,
        broker_id: BrokerId,
        page: PageRequest,
    ) -> BillingResult<Page<InvoiceView>> {
        let criteria = InvoiceCriteria {
            broker_id: Some(broker_id),
            ..Default::default()
        };
        self.list_invoices(&criteria, page).await
    }

    /// Past-due unsettled invoices, oldest due date first
    pub async fn overdue_invoices(&self, page: PageRequest) -> BillingResult<Page<InvoiceView>> {
        let filter = overdue_filter(self.clock.now());
        let page = paginate(
            self.stores.invoices.as_ref(),
            &filter,
            Sort::asc(InvoiceSortKey::DueDate),
            page.normalize(DEFAULT_PAGE_SIZE),
        )
        .await?;
        self.invoice_page(page).await
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Runs every payment rule against the store
    ///
    /// `excluding` leaves one existing payment out of the collected total so
    /// an edited payment is not counted against itself.
    pub async fn validate_payment(
        &self,
        draft: PaymentDraft,
        excluding: Option<PaymentId>,
    ) -> BillingResult<(ValidPaymentDraft, Invoice)> {
        let valid = draft.validate_fields()?;
        let invoice = self
            .stores
            .invoices
            .find_by_id(valid.invoice_id)
            .await?
            .ok_or_else(|| BillingError::validation("Invoice not found"))?;

        if invoice.currency() != valid.amount.currency() {
            return Err(BillingError::validation(
                "Payment currency must match invoice currency",
            ));
        }
        if invoice.broker_id != valid.broker_id {
            return Err(BillingError::validation(
                "Payment broker must match invoice broker",
            ));
        }
        if invoice.status == InvoiceStatus::Canceled {
            return Err(BillingError::validation(
                "Cannot record payment against a canceled invoice",
            ));
        }

        let collected = self.collected(invoice.id, excluding).await?;
        let remaining = invoice.amount.amount() - collected;
        if valid.amount.amount() > remaining {
            return Err(BillingError::validation(
                "Payment amount exceeds remaining balance",
            ));
        }
        Ok((valid, invoice))
    }

    /// Records a payment and recomputes its invoice
    ///
    /// # Errors
    ///
    /// A recompute failure is returned even though the payment is already
    /// stored; retrying the recompute restores consistency.
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller))]
    pub async fn record_payment(
        &self,
        ctx: &OperationContext,
        draft: PaymentDraft,
    ) -> BillingResult<Payment> {
        let (valid, _) = self.validate_payment(draft, None).await?;
        let now = self.clock.now();
        let payment = self
            .stores
            .payments
            .insert(valid.into_payment(&ctx.caller, now))
            .await?;
        info!(payment = %payment.id, invoice = %payment.invoice_id, amount = %payment.amount, "payment recorded");

        let invoice = self.recompute_invoice(payment.invoice_id).await?;
        match self.stores.brokers.find_by_id(payment.broker_id).await {
            Ok(Some(broker)) => self
                .outbox
                .enqueue(Notification::payment_received(&broker, &payment, &invoice)),
            Ok(None) => warn!(broker = %payment.broker_id, "broker missing, payment notification skipped"),
            Err(error) => warn!(%error, "broker lookup failed, payment notification skipped"),
        }
        Ok(payment)
    }

    /// Replaces a payment and recomputes the invoices it moved between
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller, payment_id = %id))]
    pub async fn update_payment(
        &self,
        ctx: &OperationContext,
        id: PaymentId,
        draft: PaymentDraft,
    ) -> BillingResult<Payment> {
        let existing = require(self.stores.payments.as_ref(), id).await?;
        let (valid, _) = self.validate_payment(draft, Some(id)).await?;
        let now = self.clock.now();
        let payment = self
            .stores
            .payments
            .update_fields(id, valid.into_fields(now))
            .await?;

        self.recompute_invoice(existing.invoice_id).await?;
        if payment.invoice_id != existing.invoice_id {
            self.recompute_invoice(payment.invoice_id).await?;
        }
        info!(payment = %payment.id, "payment updated");
        Ok(payment)
    }

    /// Removes a payment and recomputes its invoice
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, payment_id = %id))]
    pub async fn delete_payment(&self, ctx: &OperationContext, id: PaymentId) -> BillingResult<()> {
        let payment = require(self.stores.payments.as_ref(), id).await?;
        self.stores.payments.delete(id).await?;
        info!(payment = %payment.id, invoice = %payment.invoice_id, "payment deleted");
        self.recompute_invoice(payment.invoice_id).await?;
        Ok(())
    }

    /// Fetches a payment with its broker name and invoice number
    ///
    /// # Errors
    ///
    /// * `NotFound` - no payment has this id
    pub async fn get_payment(&self, id: PaymentId) -> BillingResult<PaymentView> {
        let payment = require(self.stores.payments.as_ref(), id).await?;
        let mut views = self.payment_views(vec![payment]).await?;
        views
            .pop()
            .ok_or_else(|| BillingError::not_found("Payment", id))
    }

    /// Lists payments matching `criteria`, latest payment date first
    ///
    /// # Arguments
    ///
    /// * `criteria` - Broker, invoice, method, currency, date and amount filters
    /// * `page` - Requested page; out-of-range values are clamped
    pub async fn list_payments(
        &self,
        criteria: &PaymentCriteria,
        page: PageRequest,
    ) -> BillingResult<Page<PaymentView>> {
        let page = paginate(
            self.stores.payments.as_ref(),
            &criteria.to_filter(),
            Sort::desc(PaymentSortKey::PaymentDate),
            page.normalize(DEFAULT_PAGE_SIZE),
        )
        .await?;
        let views = self.payment_views(page.items).await?;
        Ok(Page {
            items: views,
            pagination: page.pagination,
        })
    }

    /// Payments received from one broker
    pub async fn payments_by_broker(
        &self,
        broker_id: BrokerId,
        page: PageRequest,
    ) -> BillingResult<Page<PaymentView>> {
        let criteria = PaymentCriteria {
            broker_id: Some(broker_id),
            ..Default::default()
        };
        self.list_payments(&criteria, page).await
    }

    /// Every payment of one invoice, most recent first
    pub async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> BillingResult<Vec<Payment>> {
        require(self.stores.invoices.as_ref(), invoice_id).await?;
        self.all_payments(Filter::all().with(PaymentCondition::Invoice(invoice_id)))
            .await
    }

    // ------------------------------------------------------------------
    // Overdue sweep
    // ------------------------------------------------------------------

    /// Notifies each broker holding overdue invoices, once per broker
    ///
    /// Reads at most [`BATCH_LIMIT`] invoices. Stale stored statuses are
    /// refreshed on the way. Requires the admin role.
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller))]
    pub async fn send_overdue_notifications(
        &self,
        ctx: &OperationContext,
    ) -> BillingResult<SweepReport> {
        if !ctx.is_admin() {
            return Err(BillingError::Forbidden(
                "Only administrators can trigger overdue notifications".to_string(),
            ));
        }

        let now = self.clock.now();
        let overdue = self
            .stores
            .invoices
            .find_many(
                &overdue_filter(now),
                Sort::asc(InvoiceSortKey::DueDate),
                Window::first(BATCH_LIMIT),
            )
            .await?;

        let mut report = SweepReport {
            invoices: overdue.len(),
            ..Default::default()
        };
        let mut order: Vec<BrokerId> = Vec::new();
        let mut by_broker: HashMap<BrokerId, Vec<Invoice>> = HashMap::new();
        for invoice in overdue {
            let refreshed = self.recompute_invoice(invoice.id).await?;
            if refreshed.status != invoice.status {
                report.refreshed += 1;
            }
            let broker_id = refreshed.broker_id;
            by_broker
                .entry(broker_id)
                .or_insert_with(|| {
                    order.push(broker_id);
                    Vec::new()
                })
                .push(refreshed);
        }

        let brokers: HashMap<BrokerId, _> = self
            .stores
            .brokers
            .find_by_ids(&order)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        for broker_id in order {
            let invoices = by_broker.remove(&broker_id).unwrap_or_default();
            match brokers.get(&broker_id) {
                Some(broker) => {
                    self.outbox
                        .enqueue(Notification::overdue(broker, &invoices, now));
                    report.brokers_notified += 1;
                }
                None => {
                    warn!(broker = %broker_id, invoices = invoices.len(), "broker missing, overdue notice skipped");
                    report.brokers_skipped += 1;
                }
            }
        }

        info!(
            invoices = report.invoices,
            refreshed = report.refreshed,
            notified = report.brokers_notified,
            "overdue sweep finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Sum of payment amounts for an invoice, optionally leaving one out
    async fn collected(
        &self,
        invoice_id: InvoiceId,
        excluding: Option<PaymentId>,
    ) -> BillingResult<Decimal> {
        let mut filter = Filter::all().with(PaymentCondition::Invoice(invoice_id));
        if let Some(id) = excluding {
            filter.push(PaymentCondition::Not(id));
        }
        let payments = self.all_payments(filter).await?;
        Ok(payments.iter().map(|p| p.amount.amount()).sum())
    }

    /// Pages through every matching payment
    async fn all_payments(&self, filter: Filter<PaymentCondition>) -> BillingResult<Vec<Payment>> {
        let mut all = Vec::new();
        loop {
            let batch = self
                .stores
                .payments
                .find_many(
                    &filter,
                    Sort::desc(PaymentSortKey::PaymentDate),
                    Window {
                        skip: all.len() as u64,
                        limit: BATCH_LIMIT,
                    },
                )
                .await?;
            let done = (batch.len() as u64) < BATCH_LIMIT;
            all.extend(batch);
            if done {
                return Ok(all);
            }
        }
    }

    async fn invoice_views(&self, invoices: Vec<Invoice>) -> BillingResult<Vec<InvoiceView>> {
        let names = broker_names(&self.stores, invoices.iter().map(|i| i.broker_id)).await?;
        let now = self.clock.now();
        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let name = names.name(&invoice.broker_id);
                InvoiceView::new(invoice, name, now)
            })
            .collect())
    }

    async fn invoice_page(&self, page: Page<Invoice>) -> BillingResult<Page<InvoiceView>> {
        let items = self.invoice_views(page.items).await?;
        Ok(Page {
            items,
            pagination: page.pagination,
        })
    }

    async fn payment_views(&self, payments: Vec<Payment>) -> BillingResult<Vec<PaymentView>> {
        let brokers = broker_names(&self.stores, payments.iter().map(|p| p.broker_id)).await?;
        let invoices = invoice_numbers(&self.stores, payments.iter().map(|p| p.invoice_id)).await?;
        Ok(payments
            .into_iter()
            .map(|payment| PaymentView {
                broker_name: brokers.name(&payment.broker_id),
                invoice_number: invoices.name(&payment.invoice_id),
                payment,
            })
            .collect())
    }
}

impl std::fmt::Debug for BillingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingLedger").finish_non_exhaustive()
    }
}
