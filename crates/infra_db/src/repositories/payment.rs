//! `payments` table mapping

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{BrokerId, Currency, InvoiceId, Money, PaymentId};
use domain_billing::payment::{PaymentCondition, PaymentField, PaymentSortKey};
use domain_billing::Payment;

use super::{parse_column, SqlDocument};
use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub broker_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: DateTime<Utc>,
    pub method: String,
    pub transaction_id: String,
    pub reference: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl SqlDocument for Payment {
    const TABLE: &'static str = "payments";
    const COLUMNS: &'static str = "id, invoice_id, broker_id, amount, currency, payment_date, \
        method, transaction_id, reference, notes, created_at, created_by";

    type Row = PaymentRow;

    fn key(id: PaymentId) -> Uuid {
        *id.as_uuid()
    }

    fn from_row(row: PaymentRow) -> Result<Self, DatabaseError> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            broker_id: BrokerId::from_uuid(row.broker_id),
            amount: Money::new(row.amount, currency),
            payment_date: row.payment_date,
            method: parse_column("method", &row.method)?,
            transaction_id: row.transaction_id,
            reference: row.reference,
            notes: row.notes,
            created_at: row.created_at,
            created_by: row.created_by,
        })
    }

    fn push_values<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        let mut values = qb.separated(", ");
        values
            .push_bind(*self.id.as_uuid())
            .push_bind(*self.invoice_id.as_uuid())
            .push_bind(*self.broker_id.as_uuid())
            .push_bind(self.amount.amount())
            .push_bind(self.amount.currency().code())
            .push_bind(self.payment_date)
            .push_bind(self.method.as_str())
            .push_bind(self.transaction_id.clone())
            .push_bind(self.reference.clone())
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.created_by.clone());
    }

    fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &PaymentCondition) {
        match condition {
            PaymentCondition::Invoice(id) => {
                qb.push("invoice_id = ").push_bind(*id.as_uuid());
            }
            PaymentCondition::Broker(id) => {
                qb.push("broker_id = ").push_bind(*id.as_uuid());
            }
            PaymentCondition::Method(method) => {
                qb.push("method = ").push_bind(method.as_str());
            }
            PaymentCondition::Currency(currency) => {
                qb.push("currency = ").push_bind(currency.code());
            }
            PaymentCondition::PaidFrom(at) => {
                qb.push("payment_date >= ").push_bind(*at);
            }
            PaymentCondition::PaidBefore(at) => {
                qb.push("payment_date < ").push_bind(*at);
            }
            PaymentCondition::AmountFrom(amount) => {
                qb.push("amount >= ").push_bind(*amount);
            }
            PaymentCondition::AmountTo(amount) => {
                qb.push("amount <= ").push_bind(*amount);
            }
            PaymentCondition::Not(id) => {
                qb.push("id <> ").push_bind(*id.as_uuid());
            }
        }
    }

    fn push_assignment<'args>(qb: &mut QueryBuilder<'args, Postgres>, field: PaymentField) {
        match field {
            PaymentField::InvoiceId(v) => qb.push("invoice_id = ").push_bind(*v.as_uuid()),
            PaymentField::BrokerId(v) => qb.push("broker_id = ").push_bind(*v.as_uuid()),
            PaymentField::Amount(v) => qb
                .push("amount = ")
                .push_bind(v.amount())
                .push(", currency = ")
                .push_bind(v.currency().code()),
            PaymentField::PaymentDate(v) => qb.push("payment_date = ").push_bind(v),
            PaymentField::Method(v) => qb.push("method = ").push_bind(v.as_str()),
            PaymentField::TransactionId(v) => qb.push("transaction_id = ").push_bind(v),
            PaymentField::Reference(v) => qb.push("reference = ").push_bind(v),
            PaymentField::Notes(v) => qb.push("notes = ").push_bind(v),
        };
    }

    fn sort_column(key: PaymentSortKey) -> &'static str {
        match key {
            PaymentSortKey::PaymentDate => "payment_date",
            PaymentSortKey::CreatedAt => "created_at",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{push_filter, push_order_and_window};
    use chrono::TimeZone;
    use domain_billing::query::{Filter, Sort, Window};

    #[test]
    fn test_period_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let filter = Filter::all()
            .with(PaymentCondition::PaidFrom(start))
            .with(PaymentCondition::PaidBefore(end));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM payments");
        push_filter::<Payment>(&mut qb, &filter);
        push_order_and_window::<Payment>(
            &mut qb,
            Sort::desc(PaymentSortKey::PaymentDate),
            Window::first(1000),
        );

        assert_eq!(
            qb.sql(),
            "SELECT id FROM payments WHERE TRUE AND payment_date >= $1 AND payment_date < $2 \
             ORDER BY payment_date DESC, id DESC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn test_exclusion_condition() {
        let filter = Filter::all()
            .with(PaymentCondition::Invoice(InvoiceId::new()))
            .with(PaymentCondition::Not(PaymentId::new()));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT amount FROM payments");
        push_filter::<Payment>(&mut qb, &filter);
        assert!(qb.sql().ends_with("invoice_id = $1 AND id <> $2"));
    }
}
