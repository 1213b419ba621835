//! Invoice records and the status rule
//!
//! An invoice's `status` and `paid_amount` are never edited directly; they
//! are resynchronised from payments by the ledger's recompute operation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BrokerId, Currency, InvoiceId, LoadId, Money};

use crate::error::{BillingError, BillingResult};
use crate::ports::Document;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Canceled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Pending,
        InvoiceStatus::Partial,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Canceled,
    ];

    /// Statuses of invoices that still carry a balance to collect
    pub const UNSETTLED: [InvoiceStatus; 3] = [
        InvoiceStatus::Pending,
        InvoiceStatus::Partial,
        InvoiceStatus::Overdue,
    ];

    /// Statuses of invoices that are closed for collection
    pub const SETTLED: [InvoiceStatus; 2] = [InvoiceStatus::Paid, InvoiceStatus::Canceled];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Canceled => "canceled",
        }
    }

    pub fn is_settled(&self) -> bool {
        Self::SETTLED.contains(self)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::validation("Invalid invoice status"))
    }
}

/// Derives an invoice status from its amounts and due date
///
/// `canceled` is never produced; it is an operator decision, not a derived
/// state.
pub fn derive_status(
    amount: Decimal,
    paid_amount: Decimal,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> InvoiceStatus {
    if paid_amount >= amount {
        InvoiceStatus::Paid
    } else if paid_amount > Decimal::ZERO {
        InvoiceStatus::Partial
    } else if now > due_date {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

/// A billing document for one or more loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable number, `INV-YYYYMM-NNNN`
    pub number: String,
    pub broker_id: BrokerId,
    /// Face amount; its currency is the invoice currency
    pub amount: Money,
    /// Sum of recorded payments, always within `[0, amount]`
    pub paid_amount: Money,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub description: String,
    pub load_ids: Vec<LoadId>,
    pub notes: String,
}

impl Invoice {
    pub fn currency(&self) -> Currency {
        self.amount.currency()
    }

    /// Balance still to collect, never negative
    pub fn remaining(&self) -> Money {
        self.amount
            .saturating_sub(&self.paid_amount)
            .unwrap_or_else(|_| Money::zero(self.currency()))
    }

    /// Past due and still open for collection
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now && !self.status.is_settled()
    }
}

/// Caller input for creating or replacing an invoice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub broker_id: Option<BrokerId>,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub load_ids: Vec<LoadId>,
    #[serde(default)]
    pub notes: String,
}

/// An invoice draft that passed the field-level checks
#[derive(Debug, Clone)]
pub struct ValidInvoiceDraft {
    pub broker_id: BrokerId,
    pub amount: Money,
    pub due_date: DateTime<Utc>,
    pub description: String,
    pub load_ids: Vec<LoadId>,
    pub notes: String,
}

impl InvoiceDraft {
    pub fn validate(self) -> BillingResult<ValidInvoiceDraft> {
        if Money::stored_amount(self.amount) <= Decimal::ZERO {
            return Err(BillingError::validation(
                "Invoice amount must be greater than zero",
            ));
        }
        let currency = parse_currency(&self.currency)?;
        let due_date = self
            .due_date
            .ok_or_else(|| BillingError::validation("Due date is required"))?;
        let broker_id = self
            .broker_id
            .ok_or_else(|| BillingError::validation("Broker ID is required"))?;

        Ok(ValidInvoiceDraft {
            broker_id,
            amount: Money::new(self.amount, currency),
            due_date,
            description: self.description,
            load_ids: self.load_ids,
            notes: self.notes,
        })
    }
}

impl ValidInvoiceDraft {
    pub fn into_invoice(self, number: String, now: DateTime<Utc>) -> Invoice {
        let currency = self.amount.currency();
        Invoice {
            id: InvoiceId::new_v7(),
            number,
            broker_id: self.broker_id,
            amount: self.amount,
            paid_amount: Money::zero(currency),
            status: InvoiceStatus::Pending,
            created_at: now,
            updated_at: now,
            due_date: self.due_date,
            paid_at: None,
            description: self.description,
            load_ids: self.load_ids,
            notes: self.notes,
        }
    }

    /// Fields replaced by an edit; status and paid amount are left to recompute
    pub fn into_fields(self, now: DateTime<Utc>) -> Vec<InvoiceField> {
        vec![
            InvoiceField::BrokerId(self.broker_id),
            InvoiceField::Amount(self.amount),
            InvoiceField::DueDate(self.due_date),
            InvoiceField::Description(self.description),
            InvoiceField::LoadIds(self.load_ids),
            InvoiceField::Notes(self.notes),
            InvoiceField::UpdatedAt(now),
        ]
    }
}

/// Shared currency check used by every draft carrying a currency code
pub(crate) fn parse_currency(raw: &str) -> BillingResult<Currency> {
    if raw.is_empty() {
        return Err(BillingError::validation("Currency is required"));
    }
    raw.parse()
        .map_err(|_| BillingError::validation("Unsupported currency"))
}

/// Predicates understood by invoice collections
#[derive(Debug, Clone, PartialEq)]
pub enum InvoiceCondition {
    StatusIn(Vec<InvoiceStatus>),
    StatusNotIn(Vec<InvoiceStatus>),
    Broker(BrokerId),
    Currency(Currency),
    CreatedFrom(DateTime<Utc>),
    CreatedTo(DateTime<Utc>),
    AmountFrom(Decimal),
    AmountTo(Decimal),
    DueBefore(DateTime<Utc>),
    DueOnOrAfter(DateTime<Utc>),
    NumberPrefix(String),
    /// Satisfied when any inner condition holds
    AnyOf(Vec<InvoiceCondition>),
}

/// Individually updatable invoice attributes
#[derive(Debug, Clone, PartialEq)]
pub enum InvoiceField {
    BrokerId(BrokerId),
    Amount(Money),
    PaidAmount(Money),
    Status(InvoiceStatus),
    PaidAt(Option<DateTime<Utc>>),
    DueDate(DateTime<Utc>),
    Description(String),
    LoadIds(Vec<LoadId>),
    Notes(String),
    UpdatedAt(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceSortKey {
    CreatedAt,
    DueDate,
    Amount,
}

impl Document for Invoice {
    type Id = InvoiceId;
    type Condition = InvoiceCondition;
    type Field = InvoiceField;
    type SortKey = InvoiceSortKey;

    const COLLECTION: &'static str = "invoices";
    const ENTITY: &'static str = "Invoice";

    fn id(&self) -> InvoiceId {
        self.id
    }

    fn apply(&mut self, field: InvoiceField) {
        match field {
            InvoiceField::BrokerId(v) => self.broker_id = v,
            InvoiceField::Amount(v) => self.amount = v,
            InvoiceField::PaidAmount(v) => self.paid_amount = v,
            InvoiceField::Status(v) => self.status = v,
            InvoiceField::PaidAt(v) => self.paid_at = v,
            InvoiceField::DueDate(v) => self.due_date = v,
            InvoiceField::Description(v) => self.description = v,
            InvoiceField::LoadIds(v) => self.load_ids = v,
            InvoiceField::Notes(v) => self.notes = v,
            InvoiceField::UpdatedAt(v) => self.updated_at = v,
        }
    }
}

/// An invoice enriched for display
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub broker_name: String,
    pub is_overdue: bool,
    pub remaining_amount: Money,
}

impl InvoiceView {
    pub fn new(invoice: Invoice, broker_name: String, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: invoice.is_overdue(now),
            remaining_amount: invoice.remaining(),
            broker_name,
            invoice,
        }
    }
}
