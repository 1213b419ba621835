//! Port boundary shared by the billing services and their adapters
//!
//! The billing services only ever see [`PortError`] from a store or a
//! notifier, whichever adapter sits behind the port. Adapters expose their
//! reachability through [`HealthCheckable`] for the readiness probe.
//!
//! ```text
//!   BillingLedger / LoadReconciler / MetricsRollup / BrokerRegistry
//!                          │
//!          DocumentCollection<D>, Notifier  (domain_billing)
//!                 ▲                    ▲
//!     InMemoryDocumentStore     PostgresDocumentStore (infra_db)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by a store or notifier adapter
#[derive(Debug, Error)]
pub enum PortError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// A unique key (id or document number) is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend refused the write, e.g. a CHECK constraint
    #[error("Rejected by store: {0}")]
    Rejected(String),

    /// The backend could not be reached or had no capacity
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be read back into its domain type
    #[error("Malformed stored document: {0}")]
    Corrupt(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl PortError {
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        PortError::Rejected(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        PortError::Unavailable(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        PortError::Corrupt(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal(message.into())
    }

    /// Worth retrying later; the request itself was fine
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Supertrait of every port so adapters can be shared as `Arc<dyn Port>`
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    /// Serving, but some collections are failing
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn new(adapter_id: impl Into<String>, status: AdapterHealth) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status,
            latency_ms: 0,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_serving(&self) -> bool {
        self.status != AdapterHealth::Unhealthy
    }
}

#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

/// Role of whoever invoked a billing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
    Other(String),
}

impl Role {
    /// Maps a role claim; `user` is the operator role of older tokens
    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "operator" | "user" => Role::Operator,
            "viewer" => Role::Viewer,
            other => Role::Other(other.to_string()),
        }
    }

    /// Higher ranks win when a caller holds several roles
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Operator => 2,
            Role::Viewer => 1,
            Role::Other(_) => 0,
        }
    }
}

/// Who is calling, passed into every ledger and reconciliation operation
///
/// Tokens are verified at the edge; the core trusts this value and reads
/// the role only to gate admin operations.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub caller: String,
    pub role: Role,
}

impl OperationContext {
    pub fn new(caller: impl Into<String>, role: Role) -> Self {
        Self {
            caller: caller.into(),
            role,
        }
    }

    /// Scheduled jobs such as the overdue sweep
    pub fn system() -> Self {
        Self::new("system", Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
