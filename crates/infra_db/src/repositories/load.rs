//! `loads` table mapping
//!
//! Route and driver details are stored as JSONB documents; state filters
//! read them with `->>`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{BrokerId, Currency, InvoiceId, LoadId, Money};
use domain_billing::load::{LoadCondition, LoadField, LoadSortKey};
use domain_billing::{DriverInfo, Load, Route};

use super::invoice::status_names;
use super::{parse_column, prefix_pattern, push_any_of, SqlDocument};
use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct LoadRow {
    pub id: Uuid,
    pub number: String,
    pub broker_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub route: Json<Route>,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cost: Decimal,
    pub currency: String,
    pub status: String,
    pub weight: f64,
    pub distance: f64,
    pub equipment: String,
    pub driver_info: Json<DriverInfo>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SqlDocument for Load {
    const TABLE: &'static str = "loads";
    const COLUMNS: &'static str = "id, number, broker_id, invoice_id, route, pickup_date, \
        delivery_date, cost, currency, status, weight, distance, equipment, driver_info, notes, \
        created_at, updated_at";

    type Row = LoadRow;

    fn key(id: LoadId) -> Uuid {
        *id.as_uuid()
    }

    fn from_row(row: LoadRow) -> Result<Self, DatabaseError> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        Ok(Load {
            id: LoadId::from_uuid(row.id),
            number: row.number,
            broker_id: BrokerId::from_uuid(row.broker_id),
            invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
            route: row.route.0,
            pickup_date: row.pickup_date,
            delivery_date: row.delivery_date,
            cost: Money::new(row.cost, currency),
            status: parse_column("status", &row.status)?,
            weight: row.weight,
            distance: row.distance,
            equipment: row.equipment,
            driver_info: row.driver_info.0,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn push_values<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>) {
        let mut values = qb.separated(", ");
        values
            .push_bind(*self.id.as_uuid())
            .push_bind(self.number.clone())
            .push_bind(*self.broker_id.as_uuid())
            .push_bind(self.invoice_id.map(|id| *id.as_uuid()))
            .push_bind(Json(self.route.clone()))
            .push_bind(self.pickup_date)
            .push_bind(self.delivery_date)
            .push_bind(self.cost.amount())
            .push_bind(self.cost.currency().code())
            .push_bind(self.status.as_str())
            .push_bind(self.weight)
            .push_bind(self.distance)
            .push_bind(self.equipment.clone())
            .push_bind(Json(self.driver_info.clone()))
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn push_condition<'args>(qb: &mut QueryBuilder<'args, Postgres>, condition: &LoadCondition) {
        match condition {
            LoadCondition::Broker(id) => {
                qb.push("broker_id = ").push_bind(*id.as_uuid());
            }
            LoadCondition::Invoice(id) => {
                qb.push("invoice_id = ").push_bind(*id.as_uuid());
            }
            LoadCondition::NoInvoice => {
                qb.push("invoice_id IS NULL");
            }
            LoadCondition::StatusIn(statuses) => {
                let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
                qb.push("status = ANY(").push_bind(names).push(")");
            }
            LoadCondition::PickupFrom(at) => {
                qb.push("pickup_date >= ").push_bind(*at);
            }
            LoadCondition::PickupTo(at) => {
                qb.push("pickup_date <= ").push_bind(*at);
            }
            LoadCondition::OriginState(state) => {
                qb.push("route->'origin'->>'state' = ").push_bind(state.clone());
            }
            LoadCondition::DestinationState(state) => {
                qb.push("route->'destination'->>'state' = ").push_bind(state.clone());
            }
            LoadCondition::NumberPrefix(prefix) => {
                qb.push("number LIKE ").push_bind(prefix_pattern(prefix));
            }
            LoadCondition::InvoiceStatusIn(statuses) => {
                qb.push("EXISTS (SELECT 1 FROM invoices i WHERE i.id = loads.invoice_id AND i.status = ANY(")
                    .push_bind(status_names(statuses))
                    .push("))");
            }
            LoadCondition::AnyOf(inner) => push_any_of(qb, inner, Self::push_condition),
        }
    }

    fn push_assignment<'args>(qb: &mut QueryBuilder<'args, Postgres>, field: LoadField) {
        match field {
            LoadField::BrokerId(v) => qb.push("broker_id = ").push_bind(*v.as_uuid()),
            LoadField::InvoiceId(v) => qb
                .push("invoice_id = ")
                .push_bind(v.map(|id| *id.as_uuid())),
            LoadField::Route(v) => qb.push("route = ").push_bind(Json(v)),
            LoadField::PickupDate(v) => qb.push("pickup_date = ").push_bind(v),
            LoadField::DeliveryDate(v) => qb.push("delivery_date = ").push_bind(v),
            LoadField::Cost(v) => qb
                .push("cost = ")
                .push_bind(v.amount())
                .push(", currency = ")
                .push_bind(v.currency().code()),
            LoadField::Status(v) => qb.push("status = ").push_bind(v.as_str()),
            LoadField::Weight(v) => qb.push("weight = ").push_bind(v),
            LoadField::Distance(v) => qb.push("distance = ").push_bind(v),
            LoadField::Equipment(v) => qb.push("equipment = ").push_bind(v),
            LoadField::DriverInfo(v) => qb.push("driver_info = ").push_bind(Json(v)),
            LoadField::Notes(v) => qb.push("notes = ").push_bind(v),
            LoadField::UpdatedAt(v) => qb.push("updated_at = ").push_bind(v),
        };
    }

    fn sort_column(key: LoadSortKey) -> &'static str {
        match key {
            LoadSortKey::CreatedAt => "created_at",
            LoadSortKey::PickupDate => "pickup_date",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::push_filter;
    use domain_billing::reconciliation::unbilled_filter;

    #[test]
    fn test_unbilled_filter_joins_invoices() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM loads");
        push_filter::<Load>(&mut qb, &unbilled_filter(BrokerId::new()));

        assert_eq!(
            qb.sql(),
            "SELECT id FROM loads WHERE TRUE AND broker_id = $1 AND (invoice_id IS NULL OR \
             EXISTS (SELECT 1 FROM invoices i WHERE i.id = loads.invoice_id AND i.status = ANY($2)))"
        );
    }

    #[test]
    fn test_state_filters_read_route_json() {
        let filter = domain_billing::query::Filter::all()
            .with(LoadCondition::OriginState("TX".into()))
            .with(LoadCondition::DestinationState("CO".into()));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM loads");
        push_filter::<Load>(&mut qb, &filter);
        assert!(qb.sql().contains("route->'origin'->>'state' = $1"));
        assert!(qb.sql().contains("route->'destination'->>'state' = $2"));
    }
}
