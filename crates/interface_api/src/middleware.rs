//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use core_kernel::OperationContext;
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::{bearer_token, validate_token};
use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Validates the bearer token and stores the caller's `OperationContext`
/// in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let claims = bearer_token(header)
        .and_then(|token| validate_token(token, &state.config.jwt_secret))
        .map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            ApiError::Unauthorized
        })?;

    request.extensions_mut().insert(claims.operation_context());
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs every API request with its caller, status and duration.
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let caller = request
        .extensions()
        .get::<OperationContext>()
        .map(|ctx| ctx.caller.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        caller = %caller,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "API request"
    );

    response
}
