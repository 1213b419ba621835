//! Billing domain errors

use core_kernel::{MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Caller-supplied data violates a business rule
    #[error("{0}")]
    Validation(String),

    /// Referenced entity is absent
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Sequence-number allocation failed because the store was unreachable
    #[error("Number generation failed: {0}")]
    Generation(String),

    /// The caller's role does not permit the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Opaque persistence failure
    #[error("Store error: {0}")]
    Store(PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors the caller can fix by changing its input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BillingError::Validation(_) | BillingError::NotFound { .. } | BillingError::Forbidden(_)
        )
    }
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity, id } => BillingError::NotFound {
                entity: entity_label(&entity),
                id,
            },
            other => BillingError::Store(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        BillingError::Validation(err.to_string())
    }
}

fn entity_label(entity: &str) -> &'static str {
    match entity {
        "Broker" | "brokers" => "Broker",
        "Invoice" | "invoices" => "Invoice",
        "Payment" | "payments" => "Payment",
        "Load" | "loads" => "Load",
        _ => "Entity",
    }
}

/// Result alias for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
