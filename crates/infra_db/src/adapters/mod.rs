//! Domain Adapters
//!
//! Adapter implementations for the billing domain's ports, connecting the
//! collection interfaces to the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresDocumentStore;
//! use domain_billing::Stores;
//!
//! let store = Arc::new(PostgresDocumentStore::new(pool));
//! let stores = Stores::from_backend(store);
//! ```

pub mod document_store;

pub use document_store::PostgresDocumentStore;
