//! Table mappings for the billing collections
//!
//! Each collection module maps one document type onto its table: the row
//! type read back by `SELECT`, the values written by `INSERT`, and the SQL
//! fragment for every filter condition and updatable field. Queries are
//! assembled at runtime with [`QueryBuilder`] since filters are dynamic.

pub mod broker;
pub mod invoice;
pub mod load;
pub mod payment;

use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use domain_billing::query::{Direction, Filter, Sort, Window};
use domain_billing::Document;

use crate::error::DatabaseError;

/// A document stored in its own PostgreSQL table
pub trait SqlDocument: Document {
    const TABLE: &'static str;
    /// Columns in the order `push_values` binds them
    const COLUMNS: &'static str;

    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    fn key(id: Self::Id) -> Uuid;

    fn from_row(row: Self::Row) -> Result<Self, DatabaseError>;

    /// Binds one value per entry of `COLUMNS`, comma separated
    fn push_values<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>);

    fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &Self::Condition);

    /// Pushes `column = value` for one field
    fn push_assignment<'args>(qb: &mut QueryBuilder<'args, Postgres>, field: Self::Field);

    fn sort_column(key: Self::SortKey) -> &'static str;
}

/// Appends ` WHERE` with every condition of `filter` joined by `AND`
pub fn push_filter<'args, D: SqlDocument>(
    qb: &mut QueryBuilder<'args, Postgres>,
    filter: &Filter<D::Condition>,
) {
    qb.push(" WHERE TRUE");
    for condition in filter.conditions() {
        qb.push(" AND ");
        D::push_condition(qb, condition);
    }
}

/// Appends `ORDER BY` with an id tie-break, then `LIMIT`/`OFFSET`
pub fn push_order_and_window<'args, D: SqlDocument>(
    qb: &mut QueryBuilder<'args, Postgres>,
    sort: Sort<D::SortKey>,
    window: Window,
) {
    let direction = match sort.direction {
        Direction::Asc => " ASC",
        Direction::Desc => " DESC",
    };
    qb.push(" ORDER BY ")
        .push(D::sort_column(sort.key))
        .push(direction)
        .push(", id")
        .push(direction);
    qb.push(" LIMIT ")
        .push_bind(clamp_i64(window.limit))
        .push(" OFFSET ")
        .push_bind(clamp_i64(window.skip));
}

/// Pushes `(a OR b ...)`; an empty disjunction is `FALSE`
pub(crate) fn push_any_of<'args, C>(
    qb: &mut QueryBuilder<'args, Postgres>,
    conditions: &[C],
    push: fn(&mut QueryBuilder<'args, Postgres>, &C),
) {
    if conditions.is_empty() {
        qb.push("FALSE");
        return;
    }
    qb.push("(");
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        push(qb, condition);
    }
    qb.push(")");
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped
pub(crate) fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

/// `LIKE` pattern matching values starting with `prefix`
pub(crate) fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Parses a text column through the domain type's `FromStr`
pub(crate) fn parse_column<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T, DatabaseError> {
    raw.parse().map_err(|_| DatabaseError::bad_column(column, raw))
}
