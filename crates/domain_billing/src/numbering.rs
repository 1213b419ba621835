//! Human-readable document numbers
//!
//! Invoices are numbered `INV-YYYYMM-NNNN` per calendar month and loads
//! `LD-YYYYMMDD-NNN` per calendar day. The next number is the trailing
//! counter of the most recently created record in the bucket, plus one.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{BillingError, BillingResult};
use crate::invoice::{Invoice, InvoiceCondition, InvoiceSortKey};
use crate::load::{Load, LoadCondition, LoadSortKey};
use crate::ports::DocumentCollection;
use crate::query::{Filter, Sort, Window};

/// A numbering scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSequence {
    Invoice,
    Load,
}

impl NumberSequence {
    /// Period prefix including the trailing dash
    pub fn prefix(&self, now: DateTime<Utc>) -> String {
        match self {
            NumberSequence::Invoice => format!("INV-{}-", now.format("%Y%m")),
            NumberSequence::Load => format!("LD-{}-", now.format("%Y%m%d")),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            NumberSequence::Invoice => 4,
            NumberSequence::Load => 3,
        }
    }

    /// Formats the successor of `latest` within `prefix`
    ///
    /// A missing or unparseable predecessor counts as zero.
    pub fn successor(&self, prefix: &str, latest: Option<&str>) -> String {
        let last = latest
            .and_then(|number| number.strip_prefix(prefix))
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .unwrap_or(0);
        format!("{prefix}{:0width$}", last + 1, width = self.width())
    }
}

/// Allocates the next invoice number for the month containing `now`
pub async fn next_invoice_number(
    invoices: &dyn DocumentCollection<Invoice>,
    now: DateTime<Utc>,
) -> BillingResult<String> {
    let sequence = NumberSequence::Invoice;
    let prefix = sequence.prefix(now);
    let filter = Filter::all().with(InvoiceCondition::NumberPrefix(prefix.clone()));
    let latest = invoices
        .find_many(&filter, Sort::desc(InvoiceSortKey::CreatedAt), Window::first(1))
        .await
        .map_err(|e| BillingError::Generation(e.to_string()))?;

    let number = sequence.successor(&prefix, latest.first().map(|i| i.number.as_str()));
    debug!(%number, "allocated invoice number");
    Ok(number)
}

/// Allocates the next load number for the day containing `now`
pub async fn next_load_number(
    loads: &dyn DocumentCollection<Load>,
    now: DateTime<Utc>,
) -> BillingResult<String> {
    let sequence = NumberSequence::Load;
    let prefix = sequence.prefix(now);
    let filter = Filter::all().with(LoadCondition::NumberPrefix(prefix.clone()));
    let latest = loads
        .find_many(&filter, Sort::desc(LoadSortKey::CreatedAt), Window::first(1))
        .await
        .map_err(|e| BillingError::Generation(e.to_string()))?;

    let number = sequence.successor(&prefix, latest.first().map(|l| l.number.as_str()));
    debug!(%number, "allocated load number");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_prefixes() {
        let at = Utc.with_ymd_and_hms(2024, 2, 9, 12, 0, 0).unwrap();
        assert_eq!(NumberSequence::Invoice.prefix(at), "INV-202402-");
        assert_eq!(NumberSequence::Load.prefix(at), "LD-20240209-");
    }

    #[test]
    fn test_successor() {
        let seq = NumberSequence::Invoice;
        assert_eq!(seq.successor("INV-202402-", None), "INV-202402-0001");
        assert_eq!(seq.successor("INV-202402-", Some("INV-202402-0041")), "INV-202402-0042");
        assert_eq!(seq.successor("INV-202402-", Some("INV-202402-x7")), "INV-202402-0001");
        assert_eq!(NumberSequence::Load.successor("LD-20240209-", Some("LD-20240209-009")), "LD-20240209-010");
    }
}
