//! Database Test Utilities
//!
//! Throwaway PostgreSQL containers for the `infra_db` integration tests.
//! Each [`TestDatabase`] owns its container; dropping it stops the server.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "billing";
const POSTGRES_PASSWORD: &str = "billing";
const POSTGRES_DB: &str = "freight_billing_test";

const SCHEMA: &str = include_str!("../../../migrations/20260101000001_billing_schema.sql");

/// Tables in truncation order
pub const BILLING_TABLES: [&str; 4] = ["payments", "loads", "invoices", "brokers"];

pub type TestDbResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A migrated billing database running in its own container
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    url: String,
    pool: PgPool,
}

impl TestDatabase {
    /// Starts PostgreSQL and applies the billing schema
    pub async fn start() -> TestDbResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!(
            "postgres://{POSTGRES_USER}:{POSTGRES_PASSWORD}@{host}:{port}/{POSTGRES_DB}"
        );

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self {
            _container: container,
            url,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connection string for code that builds its own pool
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Empties every billing table, keeping the schema
    pub async fn truncate(&self) -> TestDbResult<()> {
        sqlx::query(&format!("TRUNCATE TABLE {}", BILLING_TABLES.join(", ")))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Starts a fresh database for one test
pub async fn create_isolated_test_database() -> TestDbResult<TestDatabase> {
    TestDatabase::start().await
}

/// Counts the rows of one billing table
pub async fn count_rows(pool: &PgPool, table: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
}
