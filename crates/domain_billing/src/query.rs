//! Query & pagination engine
//!
//! List operations turn caller criteria into a [`Filter`] through one
//! builder per collection, and [`paginate`] runs the count and the fetch
//! with that same filter so totals and pages never disagree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use core_kernel::{BrokerId, Currency, InvoiceId};

use crate::broker::{BrokerCondition, BrokerStatus};
use crate::error::BillingResult;
use crate::invoice::{InvoiceCondition, InvoiceStatus};
use crate::load::{LoadCondition, LoadStatus};
use crate::payment::{PaymentCondition, PaymentMethod};
use crate::ports::{Document, DocumentCollection, Stores};

/// Placeholder shown when a referenced broker no longer exists
pub const UNKNOWN_BROKER: &str = "Unknown Broker";
/// Placeholder shown when a referenced invoice no longer exists
pub const UNKNOWN_INVOICE: &str = "Unknown Invoice";

/// Largest accepted page size
pub const MAX_PAGE_SIZE: u64 = 100;
/// Page size used when the caller's is out of range
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Page size used for unbilled-load listings
pub const DEFAULT_UNBILLED_PAGE_SIZE: u64 = 50;

/// A conjunction of conditions; an empty filter matches everything
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C> {
    conditions: Vec<C>,
}

impl<C> Default for Filter<C> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }
}

impl<C> Filter<C> {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: C) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: C) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[C] {
        &self.conditions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<K> {
    pub key: K,
    pub direction: Direction,
}

impl<K> Sort<K> {
    pub fn asc(key: K) -> Self {
        Self { key, direction: Direction::Asc }
    }

    pub fn desc(key: K) -> Self {
        Self { key, direction: Direction::Desc }
    }
}

/// Skip/limit window of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

impl Window {
    pub fn first(limit: u64) -> Self {
        Self { skip: 0, limit }
    }
}

/// Page number and size as supplied by the caller, possibly out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: DEFAULT_PAGE_SIZE as i64 }
    }
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Clamps the page to at least 1 and replaces an out-of-range size
    pub fn normalize(self, default_limit: u64) -> PageWindow {
        let page = if self.page < 1 { 1 } else { self.page as u64 };
        let limit = if self.limit < 1 || self.limit as u64 > MAX_PAGE_SIZE {
            default_limit
        } else {
            self.limit as u64
        };
        PageWindow { page, limit }
    }
}

/// A validated 1-based page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Rows to skip and take; saturates for pages far past the end
    pub fn window(&self) -> Window {
        Window {
            skip: self.page.saturating_sub(1).saturating_mul(self.limit),
            limit: self.limit,
        }
    }
}

/// Pagination metadata returned with every list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: PageWindow, total: u64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total.div_ceil(page.limit),
            has_next: page.page.saturating_mul(page.limit) < total,
            has_prev: page.page > 1,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Runs count and fetch against the same filter
pub async fn paginate<D: Document>(
    collection: &dyn DocumentCollection<D>,
    filter: &Filter<D::Condition>,
    sort: Sort<D::SortKey>,
    page: PageWindow,
) -> BillingResult<Page<D>> {
    let total = collection.count(filter).await?;
    let items = collection.find_many(filter, sort, page.window()).await?;
    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

/// Invoice list criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceCriteria {
    #[serde(default)]
    pub statuses: Vec<InvoiceStatus>,
    pub broker_id: Option<BrokerId>,
    pub currency: Option<Currency>,
    /// Inclusive bounds on `created_at`
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_from: Option<Decimal>,
    pub amount_to: Option<Decimal>,
    /// `Some(true)` keeps only overdue invoices, `Some(false)` drops them
    pub overdue: Option<bool>,
}

impl InvoiceCriteria {
    pub fn to_filter(&self, now: DateTime<Utc>) -> Filter<InvoiceCondition> {
        let mut filter = Filter::all();
        if !self.statuses.is_empty() {
            filter.push(InvoiceCondition::StatusIn(self.statuses.clone()));
        }
        if let Some(broker_id) = self.broker_id {
            filter.push(InvoiceCondition::Broker(broker_id));
        }
        if let Some(currency) = self.currency {
            filter.push(InvoiceCondition::Currency(currency));
        }
        if let Some(from) = self.date_from {
            filter.push(InvoiceCondition::CreatedFrom(from));
        }
        if let Some(to) = self.date_to {
            filter.push(InvoiceCondition::CreatedTo(to));
        }
        if let Some(from) = self.amount_from {
            filter.push(InvoiceCondition::AmountFrom(from));
        }
        if let Some(to) = self.amount_to {
            filter.push(InvoiceCondition::AmountTo(to));
        }
        match self.overdue {
            Some(true) => {
                for condition in overdue_conditions(now) {
                    filter.push(condition);
                }
            }
            Some(false) => filter.push(InvoiceCondition::AnyOf(vec![
                InvoiceCondition::DueOnOrAfter(now),
                InvoiceCondition::StatusIn(InvoiceStatus::SETTLED.to_vec()),
            ])),
            None => {}
        }
        filter
    }
}

/// Past due and not yet settled
pub fn overdue_conditions(now: DateTime<Utc>) -> [InvoiceCondition; 2] {
    [
        InvoiceCondition::DueBefore(now),
        InvoiceCondition::StatusNotIn(InvoiceStatus::SETTLED.to_vec()),
    ]
}

pub fn overdue_filter(now: DateTime<Utc>) -> Filter<InvoiceCondition> {
    let [due, open] = overdue_conditions(now);
    Filter::all().with(due).with(open)
}

/// Payment list criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentCriteria {
    pub invoice_id: Option<InvoiceId>,
    pub broker_id: Option<BrokerId>,
    pub method: Option<PaymentMethod>,
    pub currency: Option<Currency>,
    /// Inclusive lower bound on `payment_date`
    pub date_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `payment_date`
    pub date_to: Option<DateTime<Utc>>,
    pub amount_from: Option<Decimal>,
    pub amount_to: Option<Decimal>,
}

impl PaymentCriteria {
    pub fn to_filter(&self) -> Filter<PaymentCondition> {
        let mut filter = Filter::all();
        if let Some(invoice_id) = self.invoice_id {
            filter.push(PaymentCondition::Invoice(invoice_id));
        }
        if let Some(broker_id) = self.broker_id {
            filter.push(PaymentCondition::Broker(broker_id));
        }
        if let Some(method) = self.method {
            filter.push(PaymentCondition::Method(method));
        }
        if let Some(currency) = self.currency {
            filter.push(PaymentCondition::Currency(currency));
        }
        if let Some(from) = self.date_from {
            filter.push(PaymentCondition::PaidFrom(from));
        }
        if let Some(to) = self.date_to {
            filter.push(PaymentCondition::PaidBefore(to));
        }
        if let Some(from) = self.amount_from {
            filter.push(PaymentCondition::AmountFrom(from));
        }
        if let Some(to) = self.amount_to {
            filter.push(PaymentCondition::AmountTo(to));
        }
        filter
    }
}

/// Load list criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadCriteria {
    pub broker_id: Option<BrokerId>,
    pub invoice_id: Option<InvoiceId>,
    #[serde(default)]
    pub statuses: Vec<LoadStatus>,
    /// Inclusive bounds on `pickup_date`
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub origin_state: Option<String>,
    pub destination_state: Option<String>,
}

impl LoadCriteria {
    pub fn to_filter(&self) -> Filter<LoadCondition> {
        let mut filter = Filter::all();
        if let Some(broker_id) = self.broker_id {
            filter.push(LoadCondition::Broker(broker_id));
        }
        if let Some(invoice_id) = self.invoice_id {
            filter.push(LoadCondition::Invoice(invoice_id));
        }
        if !self.statuses.is_empty() {
            filter.push(LoadCondition::StatusIn(self.statuses.clone()));
        }
        if let Some(from) = self.date_from {
            filter.push(LoadCondition::PickupFrom(from));
        }
        if let Some(to) = self.date_to {
            filter.push(LoadCondition::PickupTo(to));
        }
        if let Some(state) = self.origin_state.as_ref().filter(|s| !s.is_empty()) {
            filter.push(LoadCondition::OriginState(state.clone()));
        }
        if let Some(state) = self.destination_state.as_ref().filter(|s| !s.is_empty()) {
            filter.push(LoadCondition::DestinationState(state.clone()));
        }
        filter
    }
}

/// Broker list criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerCriteria {
    pub search: Option<String>,
    pub status: Option<BrokerStatus>,
}

impl BrokerCriteria {
    pub fn to_filter(&self) -> Filter<BrokerCondition> {
        let mut filter = Filter::all();
        if let Some(search) = self.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            filter.push(BrokerCondition::Search(search.to_string()));
        }
        if let Some(status) = self.status {
            filter.push(BrokerCondition::Status(status));
        }
        filter
    }
}

/// Left-outer lookup of broker names; absent brokers map to [`UNKNOWN_BROKER`]
pub async fn broker_names(
    stores: &Stores,
    ids: impl IntoIterator<Item = BrokerId>,
) -> BillingResult<NameLookup<BrokerId>> {
    let ids: Vec<BrokerId> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(NameLookup::empty(UNKNOWN_BROKER));
    }
    let brokers = stores.brokers.find_by_ids(&ids).await?;
    Ok(NameLookup {
        names: brokers.into_iter().map(|b| (b.id, b.company_name)).collect(),
        placeholder: UNKNOWN_BROKER,
    })
}

/// Left-outer lookup of invoice numbers; absent invoices map to [`UNKNOWN_INVOICE`]
pub async fn invoice_numbers(
    stores: &Stores,
    ids: impl IntoIterator<Item = InvoiceId>,
) -> BillingResult<NameLookup<InvoiceId>> {
    let ids: Vec<InvoiceId> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(NameLookup::empty(UNKNOWN_INVOICE));
    }
    let invoices = stores.invoices.find_by_ids(&ids).await?;
    Ok(NameLookup {
        names: invoices.into_iter().map(|i| (i.id, i.number)).collect(),
        placeholder: UNKNOWN_INVOICE,
    })
}

/// Display names keyed by id with a fallback for dangling references
#[derive(Debug, Clone)]
pub struct NameLookup<K> {
    names: HashMap<K, String>,
    placeholder: &'static str,
}

impl<K: Eq + std::hash::Hash> NameLookup<K> {
    fn empty(placeholder: &'static str) -> Self {
        Self {
            names: HashMap::new(),
            placeholder,
        }
    }

    pub fn name(&self, id: &K) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.placeholder.to_string())
    }
}
