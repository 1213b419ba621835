//! `brokers` table mapping

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::BrokerId;
use domain_billing::broker::{BrokerCondition, BrokerField, BrokerSortKey};
use domain_billing::{Address, Broker};

use super::{contains_pattern, parse_column, SqlDocument};
use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct BrokerRow {
    pub id: Uuid,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: Json<Address>,
    pub credit_limit: Decimal,
    pub reliability_score: Decimal,
    pub status: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SqlDocument for Broker {
    const TABLE: &'static str = "brokers";
    const COLUMNS: &'static str = "id, company_name, contact_person, email, phone, address, \
        credit_limit, reliability_score, status, notes, created_at, updated_at";

    type Row = BrokerRow;

    fn key(id: BrokerId) -> Uuid {
        *id.as_uuid()
    }

    fn from_row(row: BrokerRow) -> Result<Self, DatabaseError> {
        Ok(Broker {
            id: BrokerId::from_uuid(row.id),
            company_name: row.company_name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            address: row.address.0,
            credit_limit: row.credit_limit,
            reliability_score: row.reliability_score,
            status: parse_column("status", &row.status)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn push_values<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        let mut values = qb.separated(", ");
        values
            .push_bind(*self.id.as_uuid())
            .push_bind(self.company_name.clone())
            .push_bind(self.contact_person.clone())
            .push_bind(self.email.clone())
            .push_bind(self.phone.clone())
            .push_bind(Json(self.address.clone()))
            .push_bind(self.credit_limit)
            .push_bind(self.reliability_score)
            .push_bind(self.status.as_str())
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &BrokerCondition) {
        match condition {
            BrokerCondition::Status(status) => {
                qb.push("status = ").push_bind(status.as_str());
            }
            BrokerCondition::Search(query) => {
                let pattern = contains_pattern(query);
                qb.push("(");
                for (i, column) in ["company_name", "contact_person", "email", "phone"]
                    .into_iter()
                    .enumerate()
                {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(column).push(" ILIKE ").push_bind(pattern.clone());
                }
                qb.push(")");
            }
        }
    }

    fn push_assignment<'args>(qb: &mut QueryBuilder<'args, Postgres>, field: BrokerField) {
        match field {
            BrokerField::CompanyName(v) => qb.push("company_name = ").push_bind(v),
            BrokerField::ContactPerson(v) => qb.push("contact_person = ").push_bind(v),
            BrokerField::Email(v) => qb.push("email = ").push_bind(v),
            BrokerField::Phone(v) => qb.push("phone = ").push_bind(v),
            BrokerField::Address(v) => qb.push("address = ").push_bind(Json(v)),
            BrokerField::CreditLimit(v) => qb.push("credit_limit = ").push_bind(v),
            BrokerField::ReliabilityScore(v) => qb.push("reliability_score = ").push_bind(v),
            BrokerField::Status(v) => qb.push("status = ").push_bind(v.as_str()),
            BrokerField::Notes(v) => qb.push("notes = ").push_bind(v),
            BrokerField::UpdatedAt(v) => qb.push("updated_at = ").push_bind(v),
        };
    }

    fn sort_column(key: BrokerSortKey) -> &'static str {
        match key {
            BrokerSortKey::CreatedAt => "created_at",
            BrokerSortKey::CompanyName => "company_name",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::push_filter;
    use domain_billing::query::Filter;
    use domain_billing::BrokerStatus;

    #[test]
    fn test_search_spans_contact_columns() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM brokers");
        let filter = Filter::all()
            .with(BrokerCondition::Status(BrokerStatus::Active))
            .with(BrokerCondition::Search("acme".into()));
        push_filter::<Broker>(&mut qb, &filter);

        assert_eq!(
            qb.sql(),
            "SELECT id FROM brokers WHERE TRUE AND status = $1 AND (company_name ILIKE $2 \
             OR contact_person ILIKE $3 OR email ILIKE $4 OR phone ILIKE $5)"
        );
    }
}
