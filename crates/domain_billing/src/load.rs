//! Freight loads
//!
//! A load is the freight movement that justifies a charge. It belongs to a
//! broker and may be attached to one of that broker's invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BrokerId, Currency, InvoiceId, LoadId, Money};

use crate::error::{BillingError, BillingResult};
use crate::invoice::{parse_currency, InvoiceStatus};
use crate::ports::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Planned,
    InTransit,
    Delivered,
    Canceled,
}

impl LoadStatus {
    pub const ALL: [LoadStatus; 4] = [
        LoadStatus::Planned,
        LoadStatus::InTransit,
        LoadStatus::Delivered,
        LoadStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Planned => "planned",
            LoadStatus::InTransit => "in_transit",
            LoadStatus::Delivered => "delivered",
            LoadStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::validation("Invalid load status"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl Location {
    fn check(&self, end: &str) -> BillingResult<()> {
        for (value, part) in [
            (&self.address, "address"),
            (&self.city, "city"),
            (&self.state, "state"),
        ] {
            if value.trim().is_empty() {
                return Err(BillingError::validation(format!("{end} {part} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub origin: Location,
    pub destination: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub name: String,
    pub phone: String,
    pub truck_number: String,
    pub trailer_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    /// Human-readable number, `LD-YYYYMMDD-NNN`
    pub number: String,
    pub broker_id: BrokerId,
    pub invoice_id: Option<InvoiceId>,
    pub route: Route,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cost: Money,
    pub status: LoadStatus,
    pub weight: f64,
    pub distance: f64,
    pub equipment: String,
    pub driver_info: DriverInfo,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Load {
    pub fn currency(&self) -> Currency {
        self.cost.currency()
    }
}

/// Caller input for creating or replacing a load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadDraft {
    pub broker_id: Option<BrokerId>,
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    pub route: Route,
    /// Defaults to the time of creation
    #[serde(default)]
    pub pickup_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    pub cost: Decimal,
    pub currency: String,
    /// Defaults to `planned` when absent or empty
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub driver_info: DriverInfo,
    #[serde(default)]
    pub notes: String,
}

/// A load draft that passed the field-level checks
#[derive(Debug, Clone)]
pub struct ValidLoadDraft {
    pub broker_id: BrokerId,
    pub invoice_id: Option<InvoiceId>,
    pub route: Route,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub cost: Money,
    pub status: LoadStatus,
    pub weight: f64,
    pub distance: f64,
    pub equipment: String,
    pub driver_info: DriverInfo,
    pub notes: String,
}

impl LoadDraft {
    /// Checks that need no store access
    pub fn validate_fields(self) -> BillingResult<ValidLoadDraft> {
        let broker_id = self
            .broker_id
            .ok_or_else(|| BillingError::validation("Broker ID is required"))?;
        if Money::stored_amount(self.cost) <= Decimal::ZERO {
            return Err(BillingError::validation("Cost must be greater than zero"));
        }
        let currency = parse_currency(&self.currency)?;
        self.route.origin.check("Origin")?;
        self.route.destination.check("Destination")?;
        let status = match self.status.as_deref() {
            None | Some("") => LoadStatus::Planned,
            Some(raw) => raw.parse()?,
        };

        Ok(ValidLoadDraft {
            broker_id,
            invoice_id: self.invoice_id,
            route: self.route,
            pickup_date: self.pickup_date,
            delivery_date: self.delivery_date,
            cost: Money::new(self.cost, currency),
            status,
            weight: self.weight,
            distance: self.distance,
            equipment: self.equipment,
            driver_info: self.driver_info,
            notes: self.notes,
        })
    }
}

impl ValidLoadDraft {
    pub fn into_load(self, number: String, now: DateTime<Utc>) -> Load {
        Load {
            id: LoadId::new_v7(),
            number,
            broker_id: self.broker_id,
            invoice_id: self.invoice_id,
            route: self.route,
            pickup_date: self.pickup_date.unwrap_or(now),
            delivery_date: self.delivery_date,
            cost: self.cost,
            status: self.status,
            weight: self.weight,
            distance: self.distance,
            equipment: self.equipment,
            driver_info: self.driver_info,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_fields(self, now: DateTime<Utc>) -> Vec<LoadField> {
        let mut fields = vec![
            LoadField::BrokerId(self.broker_id),
            LoadField::InvoiceId(self.invoice_id),
            LoadField::Route(self.route),
            LoadField::DeliveryDate(self.delivery_date),
            LoadField::Cost(self.cost),
            LoadField::Status(self.status),
            LoadField::Weight(self.weight),
            LoadField::Distance(self.distance),
            LoadField::Equipment(self.equipment),
            LoadField::DriverInfo(self.driver_info),
            LoadField::Notes(self.notes),
            LoadField::UpdatedAt(now),
        ];
        if let Some(pickup) = self.pickup_date {
            fields.push(LoadField::PickupDate(pickup));
        }
        fields
    }
}

/// Predicates understood by load collections
#[derive(Debug, Clone, PartialEq)]
pub enum LoadCondition {
    Broker(BrokerId),
    Invoice(InvoiceId),
    /// `invoice_id` is absent
    NoInvoice,
    StatusIn(Vec<LoadStatus>),
    PickupFrom(DateTime<Utc>),
    PickupTo(DateTime<Utc>),
    OriginState(String),
    DestinationState(String),
    NumberPrefix(String),
    /// Join: the referenced invoice exists and has one of these statuses
    InvoiceStatusIn(Vec<InvoiceStatus>),
    /// Satisfied when any inner condition holds
    AnyOf(Vec<LoadCondition>),
}

/// Individually updatable load attributes
#[derive(Debug, Clone, PartialEq)]
pub enum LoadField {
    BrokerId(BrokerId),
    InvoiceId(Option<InvoiceId>),
    Route(Route),
    PickupDate(DateTime<Utc>),
    DeliveryDate(Option<DateTime<Utc>>),
    Cost(Money),
    Status(LoadStatus),
    Weight(f64),
    Distance(f64),
    Equipment(String),
    DriverInfo(DriverInfo),
    Notes(String),
    UpdatedAt(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSortKey {
    CreatedAt,
    PickupDate,
}

impl Document for Load {
    type Id = LoadId;
    type Condition = LoadCondition;
    type Field = LoadField;
    type SortKey = LoadSortKey;

    const COLLECTION: &'static str = "loads";
    const ENTITY: &'static str = "Load";

    fn id(&self) -> LoadId {
        self.id
    }

    fn apply(&mut self, field: LoadField) {
        match field {
            LoadField::BrokerId(v) => self.broker_id = v,
            LoadField::InvoiceId(v) => self.invoice_id = v,
            LoadField::Route(v) => self.route = v,
            LoadField::PickupDate(v) => self.pickup_date = v,
            LoadField::DeliveryDate(v) => self.delivery_date = v,
            LoadField::Cost(v) => self.cost = v,
            LoadField::Status(v) => self.status = v,
            LoadField::Weight(v) => self.weight = v,
            LoadField::Distance(v) => self.distance = v,
            LoadField::Equipment(v) => self.equipment = v,
            LoadField::DriverInfo(v) => self.driver_info = v,
            LoadField::Notes(v) => self.notes = v,
            LoadField::UpdatedAt(v) => self.updated_at = v,
        }
    }
}

/// A load enriched for display
#[derive(Debug, Clone, Serialize)]
pub struct LoadView {
    #[serde(flatten)]
    pub load: Load,
    pub broker_name: String,
    /// Empty when the load is not attached to an invoice
    pub invoice_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn location(city: &str) -> Location {
        Location {
            address: "1 Dock Rd".to_string(),
            city: city.to_string(),
            state: "TX".to_string(),
            ..Default::default()
        }
    }

    fn draft() -> LoadDraft {
        LoadDraft {
            broker_id: Some(BrokerId::new()),
            route: Route {
                origin: location("Dallas"),
                destination: location("Austin"),
            },
            cost: dec!(1800),
            currency: "USD".to_string(),
            ..Default::default()
        }
    }

    fn message(draft: LoadDraft) -> String {
        match draft.validate_fields() {
            Err(BillingError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_to_planned() {
        assert_eq!(draft().validate_fields().unwrap().status, LoadStatus::Planned);
    }

    #[test]
    fn test_route_requirements() {
        let mut d = draft();
        d.route.origin.city.clear();
        assert_eq!(message(d), "Origin city is required");

        let mut d = draft();
        d.route.destination.address = " ".to_string();
        assert_eq!(message(d), "Destination address is required");

        let mut d = draft();
        d.route.destination.state.clear();
        assert_eq!(message(d), "Destination state is required");
    }

    #[test]
    fn test_cost_currency_and_status() {
        assert_eq!(message(LoadDraft { cost: dec!(0), ..draft() }), "Cost must be greater than zero");
        assert_eq!(message(LoadDraft { cost: dec!(0.00001), ..draft() }), "Cost must be greater than zero");
        assert_eq!(message(LoadDraft { currency: "JPY".into(), ..draft() }), "Unsupported currency");
        assert_eq!(
            message(LoadDraft { status: Some("lost".into()), ..draft() }),
            "Invalid load status"
        );
        let ok = LoadDraft { status: Some("in_transit".into()), ..draft() };
        assert_eq!(ok.validate_fields().unwrap().status, LoadStatus::InTransit);
    }

    #[test]
    fn test_status_wire_names_match_as_str() {
        for status in [
            LoadStatus::Planned,
            LoadStatus::InTransit,
            LoadStatus::Delivered,
            LoadStatus::Canceled,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().to_string()));
        }
    }
}
