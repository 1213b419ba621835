//! Dashboard handlers

use axum::{extract::State, Json};
use domain_billing::DashboardMetrics;

use crate::dto::DataResponse;
use crate::error::ApiError;
use crate::AppState;

pub async fn dashboard_metrics(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<DashboardMetrics>>, ApiError> {
    let metrics = state.metrics.dashboard().await?;
    Ok(Json(DataResponse::new(metrics)))
}
