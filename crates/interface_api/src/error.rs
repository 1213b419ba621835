//! API error handling
//!
//! Validation messages reach the client verbatim. Store and numbering
//! failures are logged and reported with a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain_billing::BillingError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(message) => ApiError::BadRequest(message),
            BillingError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found")),
            BillingError::Forbidden(message) => ApiError::Forbidden(message),
            other @ (BillingError::Generation(_) | BillingError::Store(_)) => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(_: JsonRejection) -> Self {
        ApiError::BadRequest("Invalid request body".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(_: QueryRejection) -> Self {
        ApiError::BadRequest("Invalid query parameters".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    #[test]
    fn test_validation_maps_to_bad_request_verbatim() {
        let api: ApiError = BillingError::validation("Invoice amount must be greater than zero").into();
        assert!(matches!(&api, ApiError::BadRequest(m) if m == "Invoice amount must be greater than zero"));
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_names_entity() {
        let api: ApiError = BillingError::not_found("Invoice", "x").into();
        assert!(matches!(&api, ApiError::NotFound(m) if m == "Invoice not found"));
    }

    #[test]
    fn test_store_errors_are_opaque() {
        let api: ApiError = BillingError::Store(PortError::unavailable("db down")).into();
        assert_eq!(api.to_string(), "Internal server error");
        assert_eq!(api.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_forbidden_status() {
        let api: ApiError = BillingError::Forbidden("nope".into()).into();
        assert_eq!(api.into_response().status(), StatusCode::FORBIDDEN);
    }
}
