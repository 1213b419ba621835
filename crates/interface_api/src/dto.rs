//! Request and response shapes
//!
//! Responses use the `{ success, data, pagination }` envelope. List
//! endpoints take `page`/`limit` plus resource filters; multi-valued
//! filters such as `status` are comma separated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{BrokerId, Currency, InvoiceId};
use domain_billing::{
    BillingError, BrokerCriteria, BrokerStatus, InvoiceCriteria, InvoiceStatus, LoadCriteria,
    LoadStatus, Page, PageRequest, Pagination, PaymentCriteria, PaymentMethod,
};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, message: None, data }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), data }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self { success: true, data: page.items, pagination: page.pagination }
    }
}

/// `page` and `limit` query values; out-of-range values are normalized downstream
pub fn page_request(page: Option<i64>, limit: Option<i64>) -> PageRequest {
    let default = PageRequest::default();
    PageRequest::new(page.unwrap_or(default.page), limit.unwrap_or(default.limit))
}

/// Pagination-only query
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        page_request(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl BrokerListQuery {
    pub fn criteria(&self) -> Result<BrokerCriteria, ApiError> {
        Ok(BrokerCriteria {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            status: parse_opt::<BrokerStatus>(&self.status)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub broker_id: Option<BrokerId>,
    pub currency: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_from: Option<Decimal>,
    pub amount_to: Option<Decimal>,
    pub overdue: Option<bool>,
}

impl InvoiceListQuery {
    pub fn criteria(&self) -> Result<InvoiceCriteria, ApiError> {
        Ok(InvoiceCriteria {
            statuses: parse_list::<InvoiceStatus>(&self.status)?,
            broker_id: self.broker_id,
            currency: parse_currency(&self.currency)?,
            date_from: self.date_from,
            date_to: self.date_to,
            amount_from: self.amount_from,
            amount_to: self.amount_to,
            overdue: self.overdue,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub invoice_id: Option<InvoiceId>,
    pub broker_id: Option<BrokerId>,
    pub method: Option<String>,
    pub currency: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_from: Option<Decimal>,
    pub amount_to: Option<Decimal>,
}

impl PaymentListQuery {
    pub fn criteria(&self) -> Result<PaymentCriteria, ApiError> {
        Ok(PaymentCriteria {
            invoice_id: self.invoice_id,
            broker_id: self.broker_id,
            method: parse_opt::<PaymentMethod>(&self.method)?,
            currency: parse_currency(&self.currency)?,
            date_from: self.date_from,
            date_to: self.date_to,
            amount_from: self.amount_from,
            amount_to: self.amount_to,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub broker_id: Option<BrokerId>,
    pub invoice_id: Option<InvoiceId>,
    pub status: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub origin_state: Option<String>,
    pub destination_state: Option<String>,
}

impl LoadListQuery {
    pub fn criteria(&self) -> Result<LoadCriteria, ApiError> {
        Ok(LoadCriteria {
            broker_id: self.broker_id,
            invoice_id: self.invoice_id,
            statuses: parse_list::<LoadStatus>(&self.status)?,
            date_from: self.date_from,
            date_to: self.date_to,
            origin_state: self.origin_state.clone(),
            destination_state: self.destination_state.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadStatusRequest {
    pub status: String,
}

fn parse_opt<T>(raw: &Option<String>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = BillingError>,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(value.parse()?)),
    }
}

fn parse_list<T>(raw: &Option<String>) -> Result<Vec<T>, ApiError>
where
    T: FromStr<Err = BillingError>,
{
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(ApiError::from))
        .collect()
}

fn parse_currency(raw: &Option<String>) -> Result<Option<Currency>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(code) => code
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("Unsupported currency".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_list_is_comma_separated() {
        let query = InvoiceListQuery {
            status: Some("pending, overdue".to_string()),
            ..Default::default()
        };
        let criteria = query.criteria().unwrap();
        assert_eq!(criteria.statuses, vec![InvoiceStatus::Pending, InvoiceStatus::Overdue]);
    }

    #[test]
    fn test_unknown_status_is_bad_request() {
        let query = LoadListQuery {
            status: Some("lost".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.criteria(), Err(ApiError::BadRequest(m)) if m == "Invalid load status"));
    }

    #[test]
    fn test_page_query_default() {
        assert_eq!(PageQuery::default().request(), PageRequest::default());
        assert_eq!(page_request(Some(3), None), PageRequest::new(3, 20));
    }

    #[test]
    fn test_unsupported_currency() {
        let query = PaymentListQuery {
            currency: Some("GBP".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.criteria(), Err(ApiError::BadRequest(_))));
    }
}
