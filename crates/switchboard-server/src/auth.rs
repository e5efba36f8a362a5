//! Session token gate.
//!
//! Tokens are bound to the session id in the path, so the check runs inside
//! each session route rather than as a router-wide middleware. The bearer
//! header wins over a token passed in the body or query.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use switchboard_core::TokenAuthenticator;

use crate::error::AppError;

/// Token from `Authorization: Bearer <token>`, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Check the presented token for `session_id`. Always passes when auth is
/// disabled.
pub fn authorize(
    authenticator: &TokenAuthenticator,
    session_id: &str,
    headers: &HeaderMap,
    fallback_token: Option<&str>,
) -> Result<(), AppError> {
    let token = bearer_token(headers).or(fallback_token);
    authenticator.check(session_id, token).map_err(|e| {
        tracing::warn!(session_id, has_token = token.is_some(), "Rejected session token");
        AppError::from(e)
    })
}
