//! Load handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use core_kernel::{LoadId, OperationContext};
use domain_billing::{Load, LoadDraft, LoadView};

use crate::dto::{page_request, DataResponse, LoadListQuery, LoadStatusRequest, MessageResponse, PageResponse};
use crate::error::ApiError;
use crate::extract::{parse_id, ApiJson, ApiQuery};
use crate::AppState;

fn load_id(raw: &str) -> Result<LoadId, ApiError> {
    parse_id(raw, "load")
}

pub async fn list_loads(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LoadListQuery>,
) -> Result<Json<PageResponse<LoadView>>, ApiError> {
    let criteria = query.criteria()?;
    let page = state
        .loads
        .list_loads(&criteria, page_request(query.page, query.limit))
        .await?;
    Ok(Json(page.into()))
}

pub async fn create_load(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    ApiJson(draft): ApiJson<LoadDraft>,
) -> Result<Json<DataResponse<Load>>, ApiError> {
    let load = state.loads.create_load(&ctx, draft).await?;
    Ok(Json(DataResponse::with_message(load, "Load created successfully")))
}

pub async fn get_load(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<LoadView>>, ApiError> {
    let view = state.loads.get_load(load_id(&id)?).await?;
    Ok(Json(DataResponse::new(view)))
}

pub async fn update_load(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<LoadDraft>,
) -> Result<Json<DataResponse<Load>>, ApiError> {
    let load = state.loads.update_load(&ctx, load_id(&id)?, draft).await?;
    Ok(Json(DataResponse::with_message(load, "Load updated successfully")))
}

pub async fn update_load_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<LoadStatusRequest>,
) -> Result<Json<DataResponse<Load>>, ApiError> {
    let load = state
        .loads
        .update_load_status(&ctx, load_id(&id)?, &request.status)
        .await?;
    Ok(Json(DataResponse::with_message(load, "Load status updated")))
}

pub async fn delete_load(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.loads.delete_load(&ctx, load_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Load deleted successfully")))
}
