//! Connection pool and schema setup for the billing store

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::adapters::PostgresDocumentStore;
use crate::error::DatabaseError;

pub type DatabasePool = PgPool;

/// Pool settings for the billing store
///
/// ```rust,ignore
/// let config = DatabaseConfig::new(url).max_connections(20);
/// let store = connect_store(&config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Never above `max_connections`
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Apply `migrations/` when connecting
    pub migrate: bool,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self.min_connections = self.min_connections.min(max);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn skip_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }
}

/// Opens a pool; fails fast when the server is unreachable
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if no connection can be made
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "billing store pool ready"
    );
    Ok(pool)
}

/// Applies the SQL files under `migrations/` that have not run yet
///
/// # Errors
///
/// Returns `DatabaseError::Migration` if a migration fails to apply
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("billing schema up to date");
    Ok(())
}

/// Connects, migrates unless disabled, and wraps the pool in a store
///
/// # Arguments
///
/// * `config` - Pool settings and whether to migrate
///
/// # Errors
///
/// Any error from [`create_pool`] or [`run_migrations`]
pub async fn connect_store(config: &DatabaseConfig) -> Result<PostgresDocumentStore, DatabaseError> {
    let pool = create_pool(config).await?;
    if config.migrate {
        run_migrations(&pool).await?;
    }
    Ok(PostgresDocumentStore::new(pool))
}
