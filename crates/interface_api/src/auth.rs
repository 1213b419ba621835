//! Bearer token handling
//!
//! Tokens are HS256 JWTs issued for the billing API. A verified token is
//! turned into the `OperationContext` the billing services receive; the
//! services never see the token itself.

use chrono::{Duration, Utc};
use core_kernel::{OperationContext, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `iss` of every token this API issues and accepts
pub const ISSUER: &str = "freight-billing";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Caller id, usually an email
    pub sub: String,
    /// Role claims as issued, e.g. `["user"]`
    #[serde(default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    fn issue(caller: &str, roles: Vec<String>, ttl_secs: u64) -> Self {
        let now = Utc::now();
        let ttl = Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000));
        Self {
            sub: caller.to_string(),
            roles,
            iss: ISSUER.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Highest-ranked role claimed; a token without roles is a viewer
    pub fn role(&self) -> Role {
        self.roles
            .iter()
            .map(|raw| Role::parse(raw))
            .max_by_key(Role::rank)
            .unwrap_or(Role::Viewer)
    }

    pub fn operation_context(&self) -> OperationContext {
        OperationContext::new(self.sub.clone(), self.role())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Signs a token for `caller` valid for `ttl_secs`
pub fn create_token(
    caller: &str,
    roles: Vec<String>,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, AuthError> {
    encode(
        &Header::default(),
        &Claims::issue(caller, roles, ttl_secs),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Verifies signature, expiry and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
}

/// Token part of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn claims(roles: &[&str]) -> Claims {
        Claims::issue("ops@example.com", roles.iter().map(|r| r.to_string()).collect(), 60)
    }

    #[test]
    fn test_token_round_trip() {
        let token = create_token("ops@example.com", vec!["user".into()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "ops@example.com");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.role(), Role::Operator);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("ops@example.com", vec![], SECRET, 60).unwrap();
        assert_eq!(validate_token(&token, "other").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut foreign = claims(&["admin"]);
        foreign.iss = "someone-else".to_string();
        let token = encode(
            &Header::default(),
            &foreign,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_strongest_role_wins() {
        assert!(claims(&["viewer", "admin"]).operation_context().is_admin());
        assert_eq!(claims(&["auditor", "viewer"]).role(), Role::Viewer);
        assert_eq!(claims(&[]).role(), Role::Viewer);
    }

    #[test]
    fn test_bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
    }
}
