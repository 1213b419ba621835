//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the freight
//! billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed test data and a recording notifier
//! - `builders`: Builders for broker, invoice, payment and load drafts
//! - `database`: PostgreSQL test containers with the billing schema applied
//! - `assertions`: Assertion helpers for billing types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
