//! Invoice handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use core_kernel::{InvoiceId, OperationContext};
use domain_billing::{Invoice, InvoiceDraft, InvoiceStatus, InvoiceView, LoadView, Payment};

use crate::dto::{page_request, DataResponse, InvoiceListQuery, MessageResponse, PageQuery, PageResponse};
use crate::error::ApiError;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::AppState;

fn invoice_id(raw: &str) -> Result<InvoiceId, ApiError> {
    parse_id(raw, "invoice")
}

pub async fn list_invoices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<InvoiceListQuery>,
) -> Result<Json<PageResponse<InvoiceView>>, ApiError> {
    let criteria = query.criteria()?;
    let page = state
        .ledger
        .list_invoices(&criteria, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn overdue_invoices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PageResponse<InvoiceView>>, ApiError> {
    let page = state.ledger.overdue_invoices(query.request()).await?;
    Ok(Json(page.into()))
}

pub async fn invoices_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PageResponse<InvoiceView>>, ApiError> {
    let status: InvoiceStatus = status.parse()?;
    let page = state.ledger.invoices_by_status(status, query.request()).await?;
    Ok(Json(page.into()))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    ApiJson(draft): ApiJson<InvoiceDraft>,
) -> Result<Json<DataResponse<Invoice>>, ApiError> {
    let invoice = state.ledger.create_invoice(&ctx, draft).await?;
    Ok(Json(DataResponse::with_message(invoice, "Invoice created successfully")))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<InvoiceView>>, ApiError> {
    let view = state.ledger.get_invoice(invoice_id(&id)?).await?;
    Ok(Json(DataResponse::new(view)))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<InvoiceDraft>,
) -> Result<Json<DataResponse<Invoice>>, ApiError> {
    let invoice = state.ledger.update_invoice(&ctx, invoice_id(&id)?, draft).await?;
    Ok(Json(DataResponse::with_message(invoice, "Invoice updated successfully")))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Invoice>>, ApiError> {
    let invoice = state.ledger.cancel_invoice(&ctx, invoice_id(&id)?).await?;
    Ok(Json(DataResponse::with_message(invoice, "Invoice canceled")))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.ledger.delete_invoice(&ctx, invoice_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Invoice deleted successfully")))
}

pub async fn invoice_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Vec<Payment>>>, ApiError> {
    let payments = state.ledger.payments_for_invoice(invoice_id(&id)?).await?;
    Ok(Json(DataResponse::new(payments)))
}

pub async fn invoice_loads(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Vec<LoadView>>>, ApiError> {
    let loads = state.loads.loads_for_invoice(invoice_id(&id)?).await?;
    Ok(Json(DataResponse::new(loads)))
}

/// Re-derives the invoice's paid amount and status from its payments
pub async fn recompute_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Invoice>>, ApiError> {
    let invoice = state.ledger.recompute_invoice(invoice_id(&id)?).await?;
    Ok(Json(DataResponse::new(invoice)))
}
