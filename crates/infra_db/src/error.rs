//! PostgreSQL failures and their `PortError` translation
//!
//! Adapters work with [`DatabaseError`] internally and convert at the port
//! boundary, so the billing services never match on SQLSTATE codes.

use core_kernel::PortError;
use thiserror::Error;

/// SQLSTATE `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE `check_violation`
const CHECK_VIOLATION: &str = "23514";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Every pooled connection stayed busy past the acquire timeout
    #[error("No free connection in the pool")]
    PoolExhausted,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Document id or invoice number already stored
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Check constraint failed: {0}")]
    CheckFailed(String),

    /// A row whose columns do not map back onto a billing document
    #[error("Unreadable row: {0}")]
    BadRow(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl DatabaseError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// A text column holding a value its enum does not know
    pub fn bad_column(column: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::BadRow(format!("unexpected value '{value}' in column {column}"))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::BadRow(error.to_string())
            }
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => DatabaseError::DuplicateKey(message),
                    Some(CHECK_VIOLATION) => DatabaseError::CheckFailed(message),
                    _ => DatabaseError::Query(message),
                }
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::Migration(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateKey(key) => PortError::conflict(key),
            DatabaseError::CheckFailed(detail) => PortError::rejected(detail),
            DatabaseError::ConnectionFailed(detail) => PortError::unavailable(detail),
            DatabaseError::PoolExhausted => PortError::unavailable("connection pool exhausted"),
            DatabaseError::BadRow(detail) => PortError::corrupt(detail),
            other @ (DatabaseError::Migration(_) | DatabaseError::Query(_)) => {
                PortError::internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_row_stays_not_found() {
        let port: PortError = DatabaseError::not_found("Invoice", "INV-1").into();
        assert!(port.is_not_found());
        assert_eq!(port.to_string(), "Invoice INV-1 not found");
    }

    #[test]
    fn test_duplicate_number_is_a_conflict() {
        let port: PortError = DatabaseError::DuplicateKey("invoices_number_key".into()).into();
        assert!(matches!(port, PortError::Conflict(_)));
    }

    #[test]
    fn test_unreachable_server_is_transient() {
        let refused: PortError = DatabaseError::ConnectionFailed("refused".into()).into();
        assert!(refused.is_transient());
        let busy: PortError = DatabaseError::from(sqlx::Error::PoolTimedOut).into();
        assert!(busy.is_transient());
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let error = DatabaseError::bad_column("status", "lost");
        assert_eq!(error.to_string(), "Unreadable row: unexpected value 'lost' in column status");
        assert!(matches!(PortError::from(error), PortError::Corrupt(_)));
    }
}
