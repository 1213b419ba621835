//! Payment records
//!
//! A payment is a remittance applied against exactly one invoice. It carries
//! the invoice's broker redundantly so broker-level queries stay single
//! collection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BrokerId, Currency, InvoiceId, Money, PaymentId};

use crate::error::{BillingError, BillingResult};
use crate::invoice::parse_currency;
use crate::ports::Document;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    WireTransfer,
    Check,
    Cash,
    Card,
    Crypto,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::WireTransfer,
        PaymentMethod::Check,
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Crypto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::WireTransfer => "wire_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Crypto => "crypto",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| BillingError::validation("Invalid payment method"))
    }
}

/// A recorded remittance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub broker_id: BrokerId,
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub reference: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Payment {
    pub fn currency(&self) -> Currency {
        self.amount.currency()
    }
}

/// Caller input for recording or replacing a payment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub invoice_id: Option<InvoiceId>,
    pub broker_id: Option<BrokerId>,
    pub amount: Decimal,
    pub currency: String,
    /// Defaults to the time of recording
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    pub method: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub notes: String,
}

/// A payment draft that passed the field-level checks
#[derive(Debug, Clone)]
pub struct ValidPaymentDraft {
    pub invoice_id: InvoiceId,
    pub broker_id: BrokerId,
    pub amount: Money,
    pub payment_date: Option<DateTime<Utc>>,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub reference: String,
    pub notes: String,
}

impl PaymentDraft {
    /// Checks that need no store access
    pub fn validate_fields(self) -> BillingResult<ValidPaymentDraft> {
        if Money::stored_amount(self.amount) <= Decimal::ZERO {
            return Err(BillingError::validation(
                "Payment amount must be greater than zero",
            ));
        }
        let currency = parse_currency(&self.currency)?;
        if self.method.is_empty() {
            return Err(BillingError::validation("Payment method is required"));
        }
        let method: PaymentMethod = self.method.parse()?;
        let invoice_id = self
            .invoice_id
            .ok_or_else(|| BillingError::validation("Invoice ID is required"))?;
        let broker_id = self
            .broker_id
            .ok_or_else(|| BillingError::validation("Broker ID is required"))?;

        Ok(ValidPaymentDraft {
            invoice_id,
            broker_id,
            amount: Money::new(self.amount, currency),
            payment_date: self.payment_date,
            method,
            transaction_id: self.transaction_id,
            reference: self.reference,
            notes: self.notes,
        })
    }
}

impl ValidPaymentDraft {
    pub fn into_payment(self, created_by: &str, now: DateTime<Utc>) -> Payment {
        Payment {
            id: PaymentId::new_v7(),
            invoice_id: self.invoice_id,
            broker_id: self.broker_id,
            amount: self.amount,
            payment_date: self.payment_date.unwrap_or(now),
            method: self.method,
            transaction_id: self.transaction_id,
            reference: self.reference,
            notes: self.notes,
            created_at: now,
            created_by: created_by.to_string(),
        }
    }

    pub fn into_fields(self, now: DateTime<Utc>) -> Vec<PaymentField> {
        vec![
            PaymentField::InvoiceId(self.invoice_id),
            PaymentField::BrokerId(self.broker_id),
            PaymentField::Amount(self.amount),
            PaymentField::PaymentDate(self.payment_date.unwrap_or(now)),
            PaymentField::Method(self.method),
            PaymentField::TransactionId(self.transaction_id),
            PaymentField::Reference(self.reference),
            PaymentField::Notes(self.notes),
        ]
    }
}

/// Predicates understood by payment collections
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCondition {
    Invoice(InvoiceId),
    Broker(BrokerId),
    Method(PaymentMethod),
    Currency(Currency),
    PaidFrom(DateTime<Utc>),
    /// Exclusive upper bound on `payment_date`
    PaidBefore(DateTime<Utc>),
    AmountFrom(Decimal),
    AmountTo(Decimal),
    Not(PaymentId),
}

/// Individually updatable payment attributes
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentField {
    InvoiceId(InvoiceId),
    BrokerId(BrokerId),
    Amount(Money),
    PaymentDate(DateTime<Utc>),
    Method(PaymentMethod),
    TransactionId(String),
    Reference(String),
    Notes(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSortKey {
    PaymentDate,
    CreatedAt,
}

impl Document for Payment {
    type Id = PaymentId;
    type Condition = PaymentCondition;
    type Field = PaymentField;
    type SortKey = PaymentSortKey;

    const COLLECTION: &'static str = "payments";
    const ENTITY: &'static str = "Payment";

    fn id(&self) -> PaymentId {
        self.id
    }

    fn apply(&mut self, field: PaymentField) {
        match field {
            PaymentField::InvoiceId(v) => self.invoice_id = v,
            PaymentField::BrokerId(v) => self.broker_id = v,
            PaymentField::Amount(v) => self.amount = v,
            PaymentField::PaymentDate(v) => self.payment_date = v,
            PaymentField::Method(v) => self.method = v,
            PaymentField::TransactionId(v) => self.transaction_id = v,
            PaymentField::Reference(v) => self.reference = v,
            PaymentField::Notes(v) => self.notes = v,
        }
    }
}

/// A payment enriched for display
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub broker_name: String,
    pub invoice_number: String,
}
