//! Adapters shipped with the domain crate
//!
//! - [`memory::InMemoryDocumentStore`]: all four collections in process memory
//! - [`logging::LoggingNotifier`]: notification sink for deployments without
//!   a delivery backend

pub mod memory;
pub mod logging;

pub use memory::InMemoryDocumentStore;
pub use logging::LoggingNotifier;
