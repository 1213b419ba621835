//! Broker handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use core_kernel::{BrokerId, OperationContext};
use domain_billing::{Broker, BrokerDraft, BrokerStats, InvoiceView, LoadView, PaymentView};

use crate::dto::{BrokerListQuery, DataResponse, MessageResponse, PageQuery, PageResponse, SearchQuery};
use crate::error::ApiError;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::AppState;

fn broker_id(raw: &str) -> Result<BrokerId, ApiError> {
    parse_id(raw, "broker")
}

pub async fn list_brokers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BrokerListQuery>,
) -> Result<Json<PageResponse<Broker>>, ApiError> {
    let criteria = query.criteria()?;
    let page = state
        .brokers
        .list_brokers(&criteria, crate::dto::page_request(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn search_brokers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<PageResponse<Broker>>, ApiError> {
    if query.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Search query is required".to_string()));
    }
    let page = state
        .brokers
        .search_brokers(&query.query, crate::dto::page_request(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn create_broker(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    ApiJson(draft): ApiJson<BrokerDraft>,
) -> Result<Json<DataResponse<Broker>>, ApiError> {
    let broker = state.brokers.create_broker(&ctx, draft).await?;
    Ok(Json(DataResponse::with_message(broker, "Broker created successfully")))
}

pub async fn get_broker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Broker>>, ApiError> {
    let broker = state.brokers.get_broker(broker_id(&id)?).await?;
    Ok(Json(DataResponse::new(broker)))
}

pub async fn update_broker(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<BrokerDraft>,
) -> Result<Json<DataResponse<Broker>>, ApiError> {
    let broker = state.brokers.update_broker(&ctx, broker_id(&id)?, draft).await?;
    Ok(Json(DataResponse::with_message(broker, "Broker updated successfully")))
}

pub async fn delete_broker(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.brokers.delete_broker(&ctx, broker_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Broker deleted successfully")))
}

pub async fn broker_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<BrokerStats>>, ApiError> {
    let stats = state.metrics.broker_stats(broker_id(&id)?).await?;
    Ok(Json(DataResponse::new(stats)))
}

pub async fn broker_invoices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PageResponse<InvoiceView>>, ApiError> {
    let page = state
        .ledger
        .invoices_by_broker(broker_id(&id)?, query.request())
        .await?;
    Ok(Json(page.into()))
}

pub async fn broker_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PageResponse<PaymentView>>, ApiError> {
    let page = state
        .ledger
        .payments_by_broker(broker_id(&id)?, query.request())
        .await?;
    Ok(Json(page.into()))
}

/// Unbilled loads default to 50 per page
pub async fn broker_unbilled_loads(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PageResponse<LoadView>>, ApiError> {
    let request = crate::dto::page_request(query.page, query.limit.or(Some(0)));
    let page = state.loads.unbilled_loads(broker_id(&id)?, request).await?;
    Ok(Json(page.into()))
}
