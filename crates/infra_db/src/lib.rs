//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the freight billing
//! system using SQLx.
//!
//! # Architecture
//!
//! The billing domain talks to storage through its `DocumentCollection`
//! port. [`PostgresDocumentStore`] implements that port once for every
//! type with a table mapping ([`SqlDocument`]); the mappings live in
//! [`repositories`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{connect_store, DatabaseConfig};
//!
//! let store = connect_store(&DatabaseConfig::new("postgres://localhost/freight_billing")).await?;
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresDocumentStore;
pub use error::DatabaseError;
pub use pool::{connect_store, create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::SqlDocument;
