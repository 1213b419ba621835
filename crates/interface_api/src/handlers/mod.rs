//! Request handlers, one module per resource

pub mod admin;
pub mod brokers;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod loads;
pub mod payments;
