//! Load reconciliation
//!
//! Keeps the load → broker → invoice references consistent and answers the
//! "unbilled" question: which of a broker's loads are not yet covered by a
//! settled invoice.

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{BrokerId, Clock, InvoiceId, LoadId, OperationContext};

use crate::error::{BillingError, BillingResult};
use crate::invoice::InvoiceStatus;
use crate::load::{
    Load, LoadCondition, LoadDraft, LoadField, LoadSortKey, LoadStatus, LoadView, ValidLoadDraft,
};
use crate::ledger::BATCH_LIMIT;
use crate::numbering::next_load_number;
use crate::ports::{require, Stores};
use crate::query::{
    broker_names, invoice_numbers, paginate, Filter, LoadCriteria, Page, PageRequest, Sort,
    Window, DEFAULT_PAGE_SIZE, DEFAULT_UNBILLED_PAGE_SIZE,
};

/// Filter selecting a broker's loads that no settled invoice covers
///
/// A load qualifies when it has no invoice, or when its invoice is still
/// pending, partial or overdue. Loads on paid or canceled invoices, and
/// loads whose invoice no longer exists, do not.
pub fn unbilled_filter(broker_id: BrokerId) -> Filter<LoadCondition> {
    Filter::all()
        .with(LoadCondition::Broker(broker_id))
        .with(LoadCondition::AnyOf(vec![
            LoadCondition::NoInvoice,
            LoadCondition::InvoiceStatusIn(InvoiceStatus::UNSETTLED.to_vec()),
        ]))
}

#[derive(Clone)]
pub struct LoadReconciler {
    stores: Stores,
    clock: Arc<dyn Clock>,
}

impl LoadReconciler {
    /// Creates a reconciler over `stores`
    ///
    /// # Arguments
    ///
    /// * `stores` - Collections the loads and their references live in
    /// * `clock` - Source of "now" for load numbers and timestamps
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self { stores, clock }
    }

    /// Checks a load draft, including its broker and invoice references
    pub async fn validate_load(&self, draft: LoadDraft) -> BillingResult<ValidLoadDraft> {
        let valid = draft.validate_fields()?;
        if self.stores.brokers.find_by_id(valid.broker_id).await?.is_none() {
            return Err(BillingError::validation("Broker not found"));
        }
        if let Some(invoice_id) = valid.invoice_id {
            let invoice = self
                .stores
                .invoices
                .find_by_id(invoice_id)
                .await?
                .ok_or_else(|| BillingError::validation("Invoice not found"))?;
            if invoice.broker_id != valid.broker_id {
                return Err(BillingError::validation(
                    "Load broker must match invoice broker",
                ));
            }
        }
        Ok(valid)
    }

    /// Registers a load under the next number of the day
    ///
    /// # Errors
    ///
    /// * `Validation` - the draft breaks a rule, or its broker or invoice is missing
    /// * `Generation` - the load number could not be allocated
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller))]
    pub async fn create_load(&self, ctx: &OperationContext, draft: LoadDraft) -> BillingResult<Load> {
        let valid = self.validate_load(draft).await?;
        let now = self.clock.now();
        let number = next_load_number(self.stores.loads.as_ref(), now).await?;
        let load = self.stores.loads.insert(valid.into_load(number, now)).await?;
        info!(load = %load.number, broker = %load.broker_id, "load created");
        Ok(load)
    }

    /// Fetches a load with its broker name and invoice number
    ///
    /// # Errors
    ///
    /// * `NotFound` - no load has this id
    pub async fn get_load(&self, id: LoadId) -> BillingResult<LoadView> {
        let load = require(self.stores.loads.as_ref(), id).await?;
        let mut views = self.load_views(vec![load]).await?;
        views.pop().ok_or_else(|| BillingError::not_found("Load", id))
    }

    /// Replaces the editable fields of a load after the same checks as `create_load`
    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller, load_id = %id))]
    pub async fn update_load(
        &self,
        ctx: &OperationContext,
        id: LoadId,
        draft: LoadDraft,
    ) -> BillingResult<Load> {
        require(self.stores.loads.as_ref(), id).await?;
        let valid = self.validate_load(draft).await?;
        let now = self.clock.now();
        let load = self
            .stores
            .loads
            .update_fields(id, valid.into_fields(now))
            .await?;
        info!(load = %load.number, "load updated");
        Ok(load)
    }

    /// Moves a load to a new status given as its string form
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, load_id = %id))]
    pub async fn update_load_status(
        &self,
        ctx: &OperationContext,
        id: LoadId,
        status: &str,
    ) -> BillingResult<Load> {
        let status: LoadStatus = status.parse()?;
        require(self.stores.loads.as_ref(), id).await?;
        let now = self.clock.now();
        let load = self
            .stores
            .loads
            .update_fields(id, vec![LoadField::Status(status), LoadField::UpdatedAt(now)])
            .await?;
        info!(load = %load.number, %status, "load status changed");
        Ok(load)
    }

    /// Removes a load; its invoice is not touched
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, load_id = %id))]
    pub async fn delete_load(&self, ctx: &OperationContext, id: LoadId) -> BillingResult<()> {
        let load = require(self.stores.loads.as_ref(), id).await?;
        self.stores.loads.delete(id).await?;
        info!(load = %load.number, "load deleted");
        Ok(())
    }

    /// Lists loads matching `criteria`, newest first
    ///
    /// # Arguments
    ///
    /// * `criteria` - Broker, invoice, status, date and route-state filters
    /// * `page` - Requested page; out-of-range values are clamped
    pub async fn list_loads(
        &self,
        criteria: &LoadCriteria,
        page: PageRequest,
    ) -> BillingResult<Page<LoadView>> {
        let page = paginate(
            self.stores.loads.as_ref(),
            &criteria.to_filter(),
            Sort::desc(LoadSortKey::CreatedAt),
            page.normalize(DEFAULT_PAGE_SIZE),
        )
        .await?;
        self.load_page(page).await
    }

    /// Loads hauled for one broker, newest first
    pub async fn loads_by_broker(
        &self,
        broker_id: BrokerId,
        page: PageRequest,
    ) -> BillingResult<Page<LoadView>> {
        let criteria = LoadCriteria {
            broker_id: Some(broker_id),
            ..Default::default()
        };
        self.list_loads(&criteria, page).await
    }

    /// Loads attached to an invoice, earliest pickup first
    pub async fn loads_for_invoice(&self, invoice_id: InvoiceId) -> BillingResult<Vec<LoadView>> {
        require(self.stores.invoices.as_ref(), invoice_id).await?;
        let loads = self
            .stores
            .loads
            .find_many(
                &Filter::all().with(LoadCondition::Invoice(invoice_id)),
                Sort::asc(LoadSortKey::PickupDate),
                Window::first(BATCH_LIMIT),
            )
            .await?;
        self.load_views(loads).await
    }

    /// Loads of `broker_id` not yet reflected on a settled invoice
    ///
    /// A load is unbilled when it has no invoice or its invoice is still
    /// pending, partial or overdue.
    ///
    /// # Arguments
    ///
    /// * `broker_id` - Broker whose loads are listed
    /// * `page` - Requested page; a missing or invalid limit means 50 rows
    pub async fn unbilled_loads(
        &self,
        broker_id: BrokerId,
        page: PageRequest,
    ) -> BillingResult<Page<LoadView>> {
        let page = paginate(
            self.stores.loads.as_ref(),
            &unbilled_filter(broker_id),
            Sort::desc(LoadSortKey::CreatedAt),
            page.normalize(DEFAULT_UNBILLED_PAGE_SIZE),
        )
        .await?;
        self.load_page(page).await
    }

    async fn load_views(&self, loads: Vec<Load>) -> BillingResult<Vec<LoadView>> {
        let brokers = broker_names(&self.stores, loads.iter().map(|l| l.broker_id)).await?;
        let invoices = invoice_numbers(&self.stores, loads.iter().filter_map(|l| l.invoice_id)).await?;
        Ok(loads
            .into_iter()
            .map(|load| LoadView {
                broker_name: brokers.name(&load.broker_id),
                invoice_number: load
                    .invoice_id
                    .map(|id| invoices.name(&id))
                    .unwrap_or_default(),
                load,
            })
            .collect())
    }

    async fn load_page(&self, page: Page<Load>) -> BillingResult<Page<LoadView>> {
        let items = self.load_views(page.items).await?;
        Ok(Page {
            items,
            pagination: page.pagination,
        })
    }
}

impl std::fmt::Debug for LoadReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadReconciler").finish_non_exhaustive()
    }
}
