//! Payment handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use core_kernel::{OperationContext, PaymentId};
use domain_billing::{Payment, PaymentDraft, PaymentView};

use crate::dto::{page_request, DataResponse, MessageResponse, PageResponse, PaymentListQuery};
use crate::error::ApiError;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::AppState;

fn payment_id(raw: &str) -> Result<PaymentId, ApiError> {
    parse_id(raw, "payment")
}

pub async fn list_payments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaymentListQuery>,
) -> Result<Json<PageResponse<PaymentView>>, ApiError> {
    let criteria = query.criteria()?;
    let page = state
        .ledger
        .list_payments(&criteria, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    ApiJson(draft): ApiJson<PaymentDraft>,
) -> Result<Json<DataResponse<Payment>>, ApiError> {
    let payment = state.ledger.record_payment(&ctx, draft).await?;
    Ok(Json(DataResponse::with_message(payment, "Payment recorded successfully")))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<PaymentView>>, ApiError> {
    let view = state.ledger.get_payment(payment_id(&id)?).await?;
    Ok(Json(DataResponse::new(view)))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<PaymentDraft>,
) -> Result<Json<DataResponse<Payment>>, ApiError> {
    let payment = state.ledger.update_payment(&ctx, payment_id(&id)?, draft).await?;
    Ok(Json(DataResponse::with_message(payment, "Payment updated successfully")))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.ledger.delete_payment(&ctx, payment_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Payment deleted successfully")))
}
