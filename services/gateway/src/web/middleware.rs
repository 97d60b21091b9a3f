//! services/gateway/src/web/middleware.rs
//!
//! Authorization gates for protected routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use file_search_core::{authorize, AccessTier};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "auth_token";

/// Extracts the session token from the `Cookie` header, if present.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Lets any valid session through and inserts its `Principal` into the
/// request extensions. Otherwise returns 401.
pub async fn require_authenticated(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, AccessTier::Authenticated, req, next).await
}

/// Like `require_authenticated`, but answers 403 for non-admin sessions.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, AccessTier::Admin, req, next).await
}

async fn gate(
    state: &AppState,
    tier: AccessTier,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authorize(&state.tokens, session_token(req.headers()), tier).map_err(|denied| {
        debug!(path = %req.uri().path(), "Access denied: {}", denied);
        ApiError::from(denied)
    })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
