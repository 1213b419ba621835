//! In-memory document store
//!
//! Backs all four collections with `tokio::sync::RwLock` tables. Used by the
//! test suites and by the server when no database is configured. Each table
//! keeps insertion order so that equal sort keys come back in a stable order.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PortError,
};

use crate::broker::{Broker, BrokerCondition, BrokerSortKey};
use crate::invoice::{Invoice, InvoiceCondition, InvoiceSortKey, InvoiceStatus};
use crate::load::{Load, LoadCondition, LoadSortKey};
use crate::payment::{Payment, PaymentCondition, PaymentSortKey};
use crate::ports::{Document, DocumentCollection};
use crate::query::{Direction, Filter, Sort, Window};

const ADAPTER_ID: &str = "memory-document-store";

struct Row<D> {
    seq: u64,
    document: D,
}

struct Table<D: Document> {
    rows: HashMap<D::Id, Row<D>>,
    next_seq: u64,
}

impl<D: Document> Default for Table<D> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            next_seq: 0,
        }
    }
}

#[derive(Default)]
struct Tables {
    brokers: RwLock<Table<Broker>>,
    invoices: RwLock<Table<Invoice>>,
    payments: RwLock<Table<Payment>>,
    loads: RwLock<Table<Load>>,
    unreachable: RwLock<HashSet<&'static str>>,
}

/// Shared in-memory backend for every collection
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    tables: Arc<Tables>,
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore").finish_non_exhaustive()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call on `collection` fail with a connection error
    pub async fn set_unreachable(&self, collection: &'static str, unreachable: bool) {
        let mut set = self.tables.unreachable.write().await;
        if unreachable {
            set.insert(collection);
        } else {
            set.remove(collection);
        }
    }

    /// Makes every collection fail with a connection error
    pub async fn set_all_unreachable(&self, unreachable: bool) {
        for collection in [
            Broker::COLLECTION,
            Invoice::COLLECTION,
            Payment::COLLECTION,
            Load::COLLECTION,
        ] {
            self.set_unreachable(collection, unreachable).await;
        }
    }

    async fn ensure_reachable(&self, collection: &'static str) -> Result<(), PortError> {
        if self.tables.unreachable.read().await.contains(collection) {
            return Err(PortError::unavailable(format!(
                "{collection} collection is unreachable"
            )));
        }
        Ok(())
    }

    /// Invoice statuses keyed by id, for evaluating load joins
    async fn invoice_statuses(&self) -> HashMap<InvoiceId, InvoiceStatus> {
        self.tables
            .invoices
            .read()
            .await
            .rows
            .values()
            .map(|row| (row.document.id, row.document.status))
            .collect()
    }
}

/// Data a predicate may need beyond its own document
#[derive(Default)]
struct JoinContext {
    invoice_statuses: HashMap<InvoiceId, InvoiceStatus>,
}

/// Per-collection storage behaviour of the in-memory backend
trait StoredDocument: Document {
    fn table(tables: &Tables) -> &RwLock<Table<Self>>;

    /// Unique human-readable number, if the collection has one
    fn number(&self) -> Option<&str> {
        None
    }

    fn needs_join(_filter: &Filter<Self::Condition>) -> bool {
        false
    }

    fn matches(&self, condition: &Self::Condition, ctx: &JoinContext) -> bool;

    fn compare(a: &Self, b: &Self, key: Self::SortKey) -> Ordering;
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl StoredDocument for Broker {
    fn table(tables: &Tables) -> &RwLock<Table<Self>> {
        &tables.brokers
    }

    fn matches(&self, condition: &BrokerCondition, _ctx: &JoinContext) -> bool {
        match condition {
            BrokerCondition::Status(status) => self.status == *status,
            BrokerCondition::Search(query) => {
                let needle = query.to_lowercase();
                [&self.company_name, &self.contact_person, &self.email, &self.phone]
                    .into_iter()
                    .any(|field| contains_ci(field, &needle))
            }
        }
    }

    fn compare(a: &Self, b: &Self, key: BrokerSortKey) -> Ordering {
        match key {
            BrokerSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            BrokerSortKey::CompanyName => a.company_name.cmp(&b.company_name),
        }
    }
}

impl StoredDocument for Invoice {
    fn table(tables: &Tables) -> &RwLock<Table<Self>> {
        &tables.invoices
    }

    fn number(&self) -> Option<&str> {
        Some(&self.number)
    }

    fn matches(&self, condition: &InvoiceCondition, ctx: &JoinContext) -> bool {
        match condition {
            InvoiceCondition::StatusIn(statuses) => statuses.contains(&self.status),
            InvoiceCondition::StatusNotIn(statuses) => !statuses.contains(&self.status),
            InvoiceCondition::Broker(id) => self.broker_id == *id,
            InvoiceCondition::Currency(currency) => self.currency() == *currency,
            InvoiceCondition::CreatedFrom(at) => self.created_at >= *at,
            InvoiceCondition::CreatedTo(at) => self.created_at <= *at,
            InvoiceCondition::AmountFrom(amount) => self.amount.amount() >= *amount,
            InvoiceCondition::AmountTo(amount) => self.amount.amount() <= *amount,
            InvoiceCondition::DueBefore(at) => self.due_date < *at,
            InvoiceCondition::DueOnOrAfter(at) => self.due_date >= *at,
            InvoiceCondition::NumberPrefix(prefix) => self.number.starts_with(prefix.as_str()),
            InvoiceCondition::AnyOf(inner) => inner.iter().any(|c| self.matches(c, ctx)),
        }
    }

    fn compare(a: &Self, b: &Self, key: InvoiceSortKey) -> Ordering {
        match key {
            InvoiceSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            InvoiceSortKey::DueDate => a.due_date.cmp(&b.due_date),
            InvoiceSortKey::Amount => a.amount.amount().cmp(&b.amount.amount()),
        }
    }
}

impl StoredDocument for Payment {
    fn table(tables: &Tables) -> &RwLock<Table<Self>> {
        &tables.payments
    }

    fn matches(&self, condition: &PaymentCondition, _ctx: &JoinContext) -> bool {
        match condition {
            PaymentCondition::Invoice(id) => self.invoice_id == *id,
            PaymentCondition::Broker(id) => self.broker_id == *id,
            PaymentCondition::Method(method) => self.method == *method,
            PaymentCondition::Currency(currency) => self.currency() == *currency,
            PaymentCondition::PaidFrom(at) => self.payment_date >= *at,
            PaymentCondition::PaidBefore(at) => self.payment_date < *at,
            PaymentCondition::AmountFrom(amount) => self.amount.amount() >= *amount,
            PaymentCondition::AmountTo(amount) => self.amount.amount() <= *amount,
            PaymentCondition::Not(id) => self.id != *id,
        }
    }

    fn compare(a: &Self, b: &Self, key: PaymentSortKey) -> Ordering {
        match key {
            PaymentSortKey::PaymentDate => a.payment_date.cmp(&b.payment_date),
            PaymentSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

fn load_condition_joins(condition: &LoadCondition) -> bool {
    match condition {
        LoadCondition::InvoiceStatusIn(_) => true,
        LoadCondition::AnyOf(inner) => inner.iter().any(load_condition_joins),
        _ => false,
    }
}

impl StoredDocument for Load {
    fn table(tables: &Tables) -> &RwLock<Table<Self>> {
        &tables.loads
    }

    fn number(&self) -> Option<&str> {
        Some(&self.number)
    }

    fn needs_join(filter: &Filter<LoadCondition>) -> bool {
        filter.conditions().iter().any(load_condition_joins)
    }

    fn matches(&self, condition: &LoadCondition, ctx: &JoinContext) -> bool {
        match condition {
            LoadCondition::Broker(id) => self.broker_id == *id,
            LoadCondition::Invoice(id) => self.invoice_id == Some(*id),
            LoadCondition::NoInvoice => self.invoice_id.is_none(),
            LoadCondition::StatusIn(statuses) => statuses.contains(&self.status),
            LoadCondition::PickupFrom(at) => self.pickup_date >= *at,
            LoadCondition::PickupTo(at) => self.pickup_date <= *at,
            LoadCondition::OriginState(state) => self.route.origin.state == *state,
            LoadCondition::DestinationState(state) => self.route.destination.state == *state,
            LoadCondition::NumberPrefix(prefix) => self.number.starts_with(prefix.as_str()),
            LoadCondition::InvoiceStatusIn(statuses) => self
                .invoice_id
                .and_then(|id| ctx.invoice_statuses.get(&id))
                .is_some_and(|status| statuses.contains(status)),
            LoadCondition::AnyOf(inner) => inner.iter().any(|c| self.matches(c, ctx)),
        }
    }

    fn compare(a: &Self, b: &Self, key: LoadSortKey) -> Ordering {
        match key {
            LoadSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            LoadSortKey::PickupDate => a.pickup_date.cmp(&b.pickup_date),
        }
    }
}

impl InMemoryDocumentStore {
    async fn join_context<D: StoredDocument>(&self, filter: &Filter<D::Condition>) -> JoinContext {
        if D::needs_join(filter) {
            JoinContext {
                invoice_statuses: self.invoice_statuses().await,
            }
        } else {
            JoinContext::default()
        }
    }
}

impl DomainPort for InMemoryDocumentStore {}

#[async_trait]
impl<D: StoredDocument> DocumentCollection<D> for InMemoryDocumentStore {
    async fn insert(&self, document: D) -> Result<D, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let mut table = D::table(&self.tables).write().await;
        let id = document.id();
        if table.rows.contains_key(&id) {
            return Err(PortError::conflict(format!("{} {} already exists", D::ENTITY, id)));
        }
        if let Some(number) = document.number() {
            if table.rows.values().any(|row| row.document.number() == Some(number)) {
                return Err(PortError::conflict(format!(
                    "{} number {} already exists",
                    D::ENTITY,
                    number
                )));
            }
        }
        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(
            id,
            Row {
                seq,
                document: document.clone(),
            },
        );
        Ok(document)
    }

    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let table = D::table(&self.tables).read().await;
        Ok(table.rows.get(&id).map(|row| row.document.clone()))
    }

    async fn find_by_ids(&self, ids: &[D::Id]) -> Result<Vec<D>, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let table = D::table(&self.tables).read().await;
        Ok(ids
            .iter()
            .filter_map(|id| table.rows.get(id).map(|row| row.document.clone()))
            .collect())
    }

    async fn find_many(
        &self,
        filter: &Filter<D::Condition>,
        sort: Sort<D::SortKey>,
        window: Window,
    ) -> Result<Vec<D>, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let ctx = self.join_context::<D>(filter).await;
        let table = D::table(&self.tables).read().await;
        let mut rows: Vec<&Row<D>> = table
            .rows
            .values()
            .filter(|row| filter.conditions().iter().all(|c| row.document.matches(c, &ctx)))
            .collect();
        rows.sort_by(|a, b| {
            let ordering = D::compare(&a.document, &b.document, sort.key).then(a.seq.cmp(&b.seq));
            match sort.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });
        Ok(rows
            .into_iter()
            .skip(usize::try_from(window.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
            .map(|row| row.document.clone())
            .collect())
    }

    async fn count(&self, filter: &Filter<D::Condition>) -> Result<u64, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let ctx = self.join_context::<D>(filter).await;
        let table = D::table(&self.tables).read().await;
        let count = table
            .rows
            .values()
            .filter(|row| filter.conditions().iter().all(|c| row.document.matches(c, &ctx)))
            .count();
        Ok(count as u64)
    }

    async fn update_fields(&self, id: D::Id, fields: Vec<D::Field>) -> Result<D, PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let mut table = D::table(&self.tables).write().await;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found(D::ENTITY, id))?;
        for field in fields {
            row.document.apply(field);
        }
        Ok(row.document.clone())
    }

    async fn delete(&self, id: D::Id) -> Result<(), PortError> {
        self.ensure_reachable(D::COLLECTION).await?;
        let mut table = D::table(&self.tables).write().await;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::not_found(D::ENTITY, id))
    }
}

#[async_trait]
impl HealthCheckable for InMemoryDocumentStore {
    async fn health_check(&self) -> HealthCheckResult {
        let unreachable = self.tables.unreachable.read().await.len();
        if unreachable == 0 {
            HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Healthy)
        } else {
            HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Degraded)
                .with_message(format!("{unreachable} collection(s) unreachable"))
        }
    }
}
