//! Broker records
//!
//! A broker is the client company being billed. Invoices and loads refer to
//! it by id; deleting a broker never cascades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::BrokerId;

use crate::error::{BillingError, BillingResult};
use crate::ports::Document;

/// Broker account standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerStatus {
    Active,
    Inactive,
    Suspended,
}

impl BrokerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerStatus::Active => "active",
            BrokerStatus::Inactive => "inactive",
            BrokerStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BrokerStatus::Active),
            "inactive" => Ok(BrokerStatus::Inactive),
            "suspended" => Ok(BrokerStatus::Suspended),
            _ => Err(BillingError::validation("Invalid broker status")),
        }
    }
}

/// Postal address of a broker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

/// A client company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub credit_limit: Decimal,
    /// Score in `[0, 10]`
    pub reliability_score: Decimal,
    pub status: BrokerStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller input for creating or replacing a broker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerDraft {
    pub company_name: String,
    #[serde(default)]
    pub contact_person: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub credit_limit: Decimal,
    #[serde(default)]
    pub reliability_score: Decimal,
    /// Defaults to `active` when absent or empty
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl BrokerDraft {
    /// Checks the draft and returns the status it resolves to
    pub fn validate(&self) -> BillingResult<BrokerStatus> {
        if self.company_name.trim().is_empty() {
            return Err(BillingError::validation("Company name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(BillingError::validation("Email is required"));
        }
        if !is_plausible_email(&self.email) {
            return Err(BillingError::validation("Invalid email format"));
        }
        if self.credit_limit.is_sign_negative() && !self.credit_limit.is_zero() {
            return Err(BillingError::validation("Credit limit cannot be negative"));
        }
        if self.reliability_score < Decimal::ZERO || self.reliability_score > Decimal::TEN {
            return Err(BillingError::validation(
                "Reliability score must be between 0 and 10",
            ));
        }
        match self.status.as_deref() {
            None | Some("") => Ok(BrokerStatus::Active),
            Some(raw) => raw.parse(),
        }
    }

    pub fn into_broker(self, status: BrokerStatus, now: DateTime<Utc>) -> Broker {
        Broker {
            id: BrokerId::new_v7(),
            company_name: self.company_name,
            contact_person: self.contact_person,
            email: self.email,
            phone: self.phone,
            address: self.address,
            credit_limit: self.credit_limit,
            reliability_score: self.reliability_score,
            status,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// The field set that replaces every editable attribute
    pub fn into_fields(self, status: BrokerStatus, now: DateTime<Utc>) -> Vec<BrokerField> {
        vec![
            BrokerField::CompanyName(self.company_name),
            BrokerField::ContactPerson(self.contact_person),
            BrokerField::Email(self.email),
            BrokerField::Phone(self.phone),
            BrokerField::Address(self.address),
            BrokerField::CreditLimit(self.credit_limit),
            BrokerField::ReliabilityScore(self.reliability_score),
            BrokerField::Status(status),
            BrokerField::Notes(self.notes),
            BrokerField::UpdatedAt(now),
        ]
    }
}

fn is_plausible_email(email: &str) -> bool {
    email.len() >= 5 && email.contains('@')
}

/// Predicates understood by broker collections
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCondition {
    Status(BrokerStatus),
    /// Case-insensitive substring over name, contact, email and phone
    Search(String),
}

/// Individually updatable broker attributes
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerField {
    CompanyName(String),
    ContactPerson(String),
    Email(String),
    Phone(String),
    Address(Address),
    CreditLimit(Decimal),
    ReliabilityScore(Decimal),
    Status(BrokerStatus),
    Notes(String),
    UpdatedAt(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerSortKey {
    CreatedAt,
    CompanyName,
}

impl Document for Broker {
    type Id = BrokerId;
    type Condition = BrokerCondition;
    type Field = BrokerField;
    type SortKey = BrokerSortKey;

    const COLLECTION: &'static str = "brokers";
    const ENTITY: &'static str = "Broker";

    fn id(&self) -> BrokerId {
        self.id
    }

    fn apply(&mut self, field: BrokerField) {
        match field {
            BrokerField::CompanyName(v) => self.company_name = v,
            BrokerField::ContactPerson(v) => self.contact_person = v,
            BrokerField::Email(v) => self.email = v,
            BrokerField::Phone(v) => self.phone = v,
            BrokerField::Address(v) => self.address = v,
            BrokerField::CreditLimit(v) => self.credit_limit = v,
            BrokerField::ReliabilityScore(v) => self.reliability_score = v,
            BrokerField::Status(v) => self.status = v,
            BrokerField::Notes(v) => self.notes = v,
            BrokerField::UpdatedAt(v) => self.updated_at = v,
        }
    }
}
