//! Broker registry

use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{BrokerId, Clock, OperationContext};

use crate::broker::{Broker, BrokerDraft, BrokerSortKey};
use crate::error::BillingResult;
use crate::invoice::InvoiceCondition;
use crate::load::LoadCondition;
use crate::ports::{require, Stores};
use crate::query::{paginate, BrokerCriteria, Filter, Page, PageRequest, Sort, DEFAULT_PAGE_SIZE};

#[derive(Clone)]
pub struct BrokerRegistry {
    stores: Stores,
    clock: Arc<dyn Clock>,
}

impl BrokerRegistry {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self { stores, clock }
    }

    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller))]
    pub async fn create_broker(
        &self,
        ctx: &OperationContext,
        draft: BrokerDraft,
    ) -> BillingResult<Broker> {
        let status = draft.validate()?;
        let broker = self
            .stores
            .brokers
            .insert(draft.into_broker(status, self.clock.now()))
            .await?;
        info!(broker = %broker.id, name = %broker.company_name, "broker created");
        Ok(broker)
    }

    pub async fn get_broker(&self, id: BrokerId) -> BillingResult<Broker> {
        Ok(require(self.stores.brokers.as_ref(), id).await?)
    }

    pub async fn list_brokers(
        &self,
        criteria: &BrokerCriteria,
        page: PageRequest,
    ) -> BillingResult<Page<Broker>> {
        paginate(
            self.stores.brokers.as_ref(),
            &criteria.to_filter(),
            Sort::desc(BrokerSortKey::CreatedAt),
            page.normalize(DEFAULT_PAGE_SIZE),
        )
        .await
    }

    /// Case-insensitive match on company name, contact, email or phone
    pub async fn search_brokers(&self, query: &str, page: PageRequest) -> BillingResult<Page<Broker>> {
        let criteria = BrokerCriteria {
            search: Some(query.to_string()),
            status: None,
        };
        self.list_brokers(&criteria, page).await
    }

    #[instrument(skip(self, ctx, draft), fields(caller = %ctx.caller, broker_id = %id))]
    pub async fn update_broker(
        &self,
        ctx: &OperationContext,
        id: BrokerId,
        draft: BrokerDraft,
    ) -> BillingResult<Broker> {
        require(self.stores.brokers.as_ref(), id).await?;
        let status = draft.validate()?;
        let broker = self
            .stores
            .brokers
            .update_fields(id, draft.into_fields(status, self.clock.now()))
            .await?;
        info!(broker = %broker.id, "broker updated");
        Ok(broker)
    }

    /// Deletes a broker without touching its invoices or loads
    #[instrument(skip(self, ctx), fields(caller = %ctx.caller, broker_id = %id))]
    pub async fn delete_broker(&self, ctx: &OperationContext, id: BrokerId) -> BillingResult<()> {
        let broker = require(self.stores.brokers.as_ref(), id).await?;
        let invoices = self
            .stores
            .invoices
            .count(&Filter::all().with(InvoiceCondition::Broker(id)))
            .await?;
        let loads = self
            .stores
            .loads
            .count(&Filter::all().with(LoadCondition::Broker(id)))
            .await?;
        if invoices > 0 || loads > 0 {
            warn!(broker = %id, invoices, loads, "deleting broker leaves records referencing it");
        }
        self.stores.brokers.delete(id).await?;
        info!(broker = %id, name = %broker.company_name, "broker deleted");
        Ok(())
    }
}

impl std::fmt::Debug for BrokerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerRegistry").finish_non_exhaustive()
    }
}
