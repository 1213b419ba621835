//! Administrative handlers

use axum::{extract::State, Extension, Json};
use core_kernel::OperationContext;
use domain_billing::SweepReport;

use crate::dto::DataResponse;
use crate::error::ApiError;
use crate::AppState;

/// Runs the overdue sweep; the ledger rejects non-admin callers
pub async fn send_overdue_notifications(
    State(state): State<AppState>,
    Extension(ctx): Extension<OperationContext>,
) -> Result<Json<DataResponse<SweepReport>>, ApiError> {
    let report = state.ledger.send_overdue_notifications(&ctx).await?;
    Ok(Json(DataResponse::with_message(report, "Overdue notifications queued")))
}
