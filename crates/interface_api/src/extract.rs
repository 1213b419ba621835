//! Extractors whose rejections render as `ApiError`

use std::str::FromStr;

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON body; a malformed body is a 400 with the standard error shape
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string; a malformed query is a 400 with the standard error shape
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Parses an identifier path segment, bare or prefixed
pub fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {entity} ID")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::InvoiceId;

    #[test]
    fn test_parse_id_accepts_prefixed_and_bare() {
        let id = InvoiceId::new();
        let bare = id.as_uuid().to_string();
        assert_eq!(parse_id::<InvoiceId>(&id.to_string(), "invoice").unwrap(), id);
        assert_eq!(parse_id::<InvoiceId>(&bare, "invoice").unwrap(), id);
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id::<InvoiceId>("nope", "invoice").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Invalid invoice ID"));
    }
}
