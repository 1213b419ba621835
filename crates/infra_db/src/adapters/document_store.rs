//! PostgreSQL Document Store Adapter
//!
//! Implements the billing domain's `DocumentCollection` port for brokers,
//! invoices, payments and loads on top of a single connection pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresDocumentStore};
//! use domain_billing::Stores;
//!
//! let pool = create_pool(&DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let stores = Stores::from_backend(Arc::new(PostgresDocumentStore::new(pool)));
//! ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_billing::query::{Filter, Sort, Window};
use domain_billing::DocumentCollection;

use crate::error::DatabaseError;
use crate::repositories::{push_filter, push_order_and_window, SqlDocument};

const ADAPTER_ID: &str = "postgres-document-store";

/// PostgreSQL-backed implementation of every billing collection
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - unique violations -> `PortError::Conflict`
/// - connection failures and pool exhaustion -> `PortError::Unavailable`
/// - CHECK violations -> `PortError::Rejected`
/// - missing rows on update/delete -> `PortError::NotFound`
/// - other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn select<'args, D: SqlDocument>() -> QueryBuilder<'args, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(D::COLUMNS).push(" FROM ").push(D::TABLE);
        qb
    }

    async fn fetch_all<D: SqlDocument>(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<D>, DatabaseError> {
        let rows: Vec<D::Row> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(D::from_row).collect()
    }
}

impl DomainPort for PostgresDocumentStore {}

#[async_trait]
impl HealthCheckable for PostgresDocumentStore {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(_) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Healthy),
            Err(e) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Unhealthy)
                .with_message(format!("Database error: {e}")),
        }
        .with_latency_ms(latency_ms)
    }
}

#[async_trait]
impl<D: SqlDocument> DocumentCollection<D> for PostgresDocumentStore {
    #[instrument(skip(self, document), fields(table = D::TABLE, id = %document.id()))]
    async fn insert(&self, document: D) -> Result<D, PortError> {
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(D::TABLE)
            .push(" (")
            .push(D::COLUMNS)
            .push(") VALUES (");
        document.push_values(&mut qb);
        qb.push(")");

        qb.build()
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        debug!("document inserted");
        Ok(document)
    }

    #[instrument(skip(self), fields(table = D::TABLE, id = %id))]
    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>, PortError> {
        let mut qb = Self::select::<D>();
        qb.push(" WHERE id = ").push_bind(D::key(id));
        let row: Option<D::Row> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.map(D::from_row).transpose()?)
    }

    #[instrument(skip(self, ids), fields(table = D::TABLE, count = ids.len()))]
    async fn find_by_ids(&self, ids: &[D::Id]) -> Result<Vec<D>, PortError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<Uuid> = ids.iter().map(|id| D::key(*id)).collect();
        let mut qb = Self::select::<D>();
        qb.push(" WHERE id = ANY(").push_bind(keys).push(")");
        Ok(self.fetch_all::<D>(qb).await?)
    }

    #[instrument(skip(self, filter), fields(table = D::TABLE, conditions = filter.conditions().len()))]
    async fn find_many(
        &self,
        filter: &Filter<D::Condition>,
        sort: Sort<D::SortKey>,
        window: Window,
    ) -> Result<Vec<D>, PortError> {
        let mut qb = Self::select::<D>();
        push_filter::<D>(&mut qb, filter);
        push_order_and_window::<D>(&mut qb, sort, window);
        Ok(self.fetch_all::<D>(qb).await?)
    }

    #[instrument(skip(self, filter), fields(table = D::TABLE))]
    async fn count(&self, filter: &Filter<D::Condition>) -> Result<u64, PortError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        qb.push(D::TABLE);
        push_filter::<D>(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, fields), fields(table = D::TABLE, id = %id, fields = fields.len()))]
    async fn update_fields(&self, id: D::Id, fields: Vec<D::Field>) -> Result<D, PortError> {
        if fields.is_empty() {
            return self
                .find_by_id(id)
                .await?
                .ok_or_else(|| PortError::not_found(D::ENTITY, id));
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        qb.push(D::TABLE).push(" SET ");
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            D::push_assignment(&mut qb, field);
        }
        qb.push(" WHERE id = ")
            .push_bind(D::key(id))
            .push(" RETURNING ")
            .push(D::COLUMNS);

        let row: Option<D::Row> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        let row = row.ok_or_else(|| DatabaseError::not_found(D::ENTITY, id))?;
        Ok(D::from_row(row)?)
    }

    #[instrument(skip(self), fields(table = D::TABLE, id = %id))]
    async fn delete(&self, id: D::Id) -> Result<(), PortError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        qb.push(D::TABLE).push(" WHERE id = ").push_bind(D::key(id));
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found(D::ENTITY, id).into());
        }
        debug!("document deleted");
        Ok(())
    }
}
