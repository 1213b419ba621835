//! `invoices` table mapping

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{BrokerId, Currency, InvoiceId, LoadId, Money};
use domain_billing::invoice::{InvoiceCondition, InvoiceField, InvoiceSortKey};
use domain_billing::{Invoice, InvoiceStatus};

use super::{parse_column, prefix_pattern, push_any_of, SqlDocument};
use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub number: String,
    pub broker_id: Uuid,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub currency: String,
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub description: String,
    pub load_ids: Vec<Uuid>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn status_names(statuses: &[InvoiceStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

impl SqlDocument for Invoice {
    const TABLE: &'static str = "invoices";
    const COLUMNS: &'static str = "id, number, broker_id, amount, paid_amount, currency, status, \
        due_date, paid_at, description, load_ids, notes, created_at, updated_at";

    type Row = InvoiceRow;

    fn key(id: InvoiceId) -> Uuid {
        *id.as_uuid()
    }

    fn from_row(row: InvoiceRow) -> Result<Self, DatabaseError> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            number: row.number,
            broker_id: BrokerId::from_uuid(row.broker_id),
            amount: Money::new(row.amount, currency),
            paid_amount: Money::new(row.paid_amount, currency),
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            due_date: row.due_date,
            paid_at: row.paid_at,
            description: row.description,
            load_ids: row.load_ids.into_iter().map(LoadId::from_uuid).collect(),
            notes: row.notes,
        })
    }

    fn push_values<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        let load_ids: Vec<Uuid> = self.load_ids.iter().map(|id| *id.as_uuid()).collect();
        let mut values = qb.separated(", ");
        values
            .push_bind(*self.id.as_uuid())
            .push_bind(self.number.clone())
            .push_bind(*self.broker_id.as_uuid())
            .push_bind(self.amount.amount())
            .push_bind(self.paid_amount.amount())
            .push_bind(self.currency().code())
            .push_bind(self.status.as_str())
            .push_bind(self.due_date)
            .push_bind(self.paid_at)
            .push_bind(self.description.clone())
            .push_bind(load_ids)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &InvoiceCondition) {
        match condition {
            InvoiceCondition::StatusIn(statuses) => {
                qb.push("status = ANY(").push_bind(status_names(statuses)).push(")");
            }
            InvoiceCondition::StatusNotIn(statuses) => {
                qb.push("NOT (status = ANY(").push_bind(status_names(statuses)).push("))");
            }
            InvoiceCondition::Broker(id) => {
                qb.push("broker_id = ").push_bind(*id.as_uuid());
            }
            InvoiceCondition::Currency(currency) => {
                qb.push("currency = ").push_bind(currency.code());
            }
            InvoiceCondition::CreatedFrom(at) => {
                qb.push("created_at >= ").push_bind(*at);
            }
            InvoiceCondition::CreatedTo(at) => {
                qb.push("created_at <= ").push_bind(*at);
            }
            InvoiceCondition::AmountFrom(amount) => {
                qb.push("amount >= ").push_bind(*amount);
            }
            InvoiceCondition::AmountTo(amount) => {
                qb.push("amount <= ").push_bind(*amount);
            }
            InvoiceCondition::DueBefore(at) => {
                qb.push("due_date < ").push_bind(*at);
            }
            InvoiceCondition::DueOnOrAfter(at) => {
                qb.push("due_date >= ").push_bind(*at);
            }
            InvoiceCondition::NumberPrefix(prefix) => {
                qb.push("number LIKE ").push_bind(prefix_pattern(prefix));
            }
            InvoiceCondition::AnyOf(inner) => push_any_of(qb, inner, Self::push_condition),
        }
    }

    fn push_assignment<'args>(qb: &mut QueryBuilder<'args, Postgres>, field: InvoiceField) {
        match field {
            InvoiceField::BrokerId(v) => qb.push("broker_id = ").push_bind(*v.as_uuid()),
            InvoiceField::Amount(v) => qb
                .push("amount = ")
                .push_bind(v.amount())
                .push(", currency = ")
                .push_bind(v.currency().code()),
            InvoiceField::PaidAmount(v) => qb.push("paid_amount = ").push_bind(v.amount()),
            InvoiceField::Status(v) => qb.push("status = ").push_bind(v.as_str()),
            InvoiceField::PaidAt(v) => qb.push("paid_at = ").push_bind(v),
            InvoiceField::DueDate(v) => qb.push("due_date = ").push_bind(v),
            InvoiceField::Description(v) => qb.push("description = ").push_bind(v),
            InvoiceField::LoadIds(v) => qb
                .push("load_ids = ")
                .push_bind(v.iter().map(|id| *id.as_uuid()).collect::<Vec<Uuid>>()),
            InvoiceField::Notes(v) => qb.push("notes = ").push_bind(v),
            InvoiceField::UpdatedAt(v) => qb.push("updated_at = ").push_bind(v),
        };
    }

    fn sort_column(key: InvoiceSortKey) -> &'static str {
        match key {
            InvoiceSortKey::CreatedAt => "created_at",
            InvoiceSortKey::DueDate => "due_date",
            InvoiceSortKey::Amount => "amount",
        }
    }
}
