//! Core Kernel - Foundational types shared by the freight billing crates
//!
//! This crate provides the building blocks used by every other crate:
//! - Money and currency types with precise decimal arithmetic
//! - Clock abstraction and calendar period helpers
//! - Strongly-typed identifiers for brokers, invoices, payments and loads
//! - Port infrastructure (errors, health checks, caller context)

pub mod money;
pub mod clock;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use clock::{Clock, SystemClock, FixedClock, Period};
pub use identifiers::{BrokerId, IdParseError, InvoiceId, LoadId, PaymentId};
pub use ports::{
    DomainPort, PortError, HealthCheckable, HealthCheckResult, AdapterHealth,
    OperationContext, Role,
};
