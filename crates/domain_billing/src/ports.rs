//! Billing Domain Ports
//!
//! The reconciliation core reads and writes through two kinds of port:
//!
//! - [`DocumentCollection`]: one per logical collection (brokers, invoices,
//!   payments, loads). Adapters evaluate typed [`Filter`] conditions,
//!   including the cross-collection `LoadCondition::InvoiceStatusIn` join.
//! - [`Notifier`]: best-effort outbound delivery of notifications.
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = Arc::new(InMemoryDocumentStore::new());
//! let stores = Stores::from_backend(backend);
//! let ledger = BillingLedger::new(stores, outbox, Arc::new(SystemClock));
//! ```

use async_trait::async_trait;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use core_kernel::{DomainPort, PortError};

use crate::broker::Broker;
use crate::invoice::Invoice;
use crate::load::Load;
use crate::notification::Notification;
use crate::payment::Payment;
use crate::query::{Filter, Sort, Window};

/// A record type stored in its own collection
pub trait Document: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;
    /// Predicate vocabulary for this collection
    type Condition: Clone + fmt::Debug + Send + Sync + 'static;
    /// Individually updatable attributes
    type Field: Clone + fmt::Debug + Send + Sync + 'static;
    type SortKey: Copy + fmt::Debug + Send + Sync + 'static;

    /// Logical collection name
    const COLLECTION: &'static str;
    /// Entity name used in not-found errors
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;

    fn apply(&mut self, field: Self::Field);
}

/// Persistence operations for one collection
///
/// All methods are async and return `Result<T, PortError>` so adapters
/// report failures uniformly.
#[async_trait]
pub trait DocumentCollection<D: Document>: DomainPort {
    /// Stores a new document
    ///
    /// # Returns
    ///
    /// The stored document, or `PortError::Conflict` if a unique key
    /// (id or human-readable number) already exists
    async fn insert(&self, document: D) -> Result<D, PortError>;

    /// Retrieves a document by id, `None` when absent
    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>, PortError>;

    /// Retrieves the documents that exist among `ids`, in no particular order
    async fn find_by_ids(&self, ids: &[D::Id]) -> Result<Vec<D>, PortError>;

    /// Fetches the documents matching every condition in `filter`
    async fn find_many(
        &self,
        filter: &Filter<D::Condition>,
        sort: Sort<D::SortKey>,
        window: Window,
    ) -> Result<Vec<D>, PortError>;

    /// Counts the documents matching `filter`
    async fn count(&self, filter: &Filter<D::Condition>) -> Result<u64, PortError>;

    /// Applies `fields` to one document in a single write
    ///
    /// # Returns
    ///
    /// The updated document, or `PortError::NotFound`
    async fn update_fields(&self, id: D::Id, fields: Vec<D::Field>) -> Result<D, PortError>;

    /// Removes a document, `PortError::NotFound` when absent
    async fn delete(&self, id: D::Id) -> Result<(), PortError>;
}

/// Loads a document or fails with `PortError::NotFound`
pub async fn require<D: Document>(
    collection: &dyn DocumentCollection<D>,
    id: D::Id,
) -> Result<D, PortError> {
    collection
        .find_by_id(id)
        .await?
        .ok_or_else(|| PortError::not_found(D::ENTITY, id))
}

/// Handles to the four collections
#[derive(Clone)]
pub struct Stores {
    pub brokers: Arc<dyn DocumentCollection<Broker>>,
    pub invoices: Arc<dyn DocumentCollection<Invoice>>,
    pub payments: Arc<dyn DocumentCollection<Payment>>,
    pub loads: Arc<dyn DocumentCollection<Load>>,
}

impl Stores {
    /// Uses one backend for every collection
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: DocumentCollection<Broker>
            + DocumentCollection<Invoice>
            + DocumentCollection<Payment>
            + DocumentCollection<Load>,
    {
        Self {
            brokers: backend.clone(),
            invoices: backend.clone(),
            payments: backend.clone(),
            loads: backend,
        }
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Outbound notification delivery
///
/// Delivery is best effort; callers never observe the result beyond logging.
#[async_trait]
pub trait Notifier: DomainPort {
    async fn notify(&self, notification: Notification) -> Result<(), PortError>;
}
