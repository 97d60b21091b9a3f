//! services/gateway/src/web/auth.rs
//!
//! Authentication endpoints: login, logout, and session introspection.
//!
//! Sessions are stateless: logout only clears the cookie in the browser. A
//! copied token stays valid until it expires.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use file_search_core::token::SESSION_TTL_MS;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::web::middleware::{session_token, SESSION_COOKIE};
use crate::web::protocol::{
    ErrorEnvelope, LoginRequest, LoginResponse, MeResponse, MessageResponse, UserView,
};
use crate::web::state::AppState;

fn session_cookie(value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// POST /api/login - Authenticate and receive a session cookie
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Username or password missing", body = ErrorEnvelope),
        (status = 401, description = "Invalid credentials", body = ErrorEnvelope)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let principal = state
        .authenticator
        .authenticate(&req.username, &req.password)
        .await?
        .ok_or_else(|| {
            warn!("Failed login for '{}'", req.username);
            ApiError::Unauthenticated("Invalid credentials".to_string())
        })?;

    let token = state.tokens.issue(&principal);
    let cookie = session_cookie(
        token.as_str(),
        SESSION_TTL_MS / 1000,
        state.config.cookie_secure,
    );
    info!("User '{}' logged in as {}", principal.username, principal.role);

    let response = LoginResponse {
        success: true,
        user: UserView::from(&principal),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /api/logout - Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Cookie cleared", body = MessageResponse)
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = session_cookie("", 0, state.config.cookie_secure);
    let response = MessageResponse {
        success: true,
        message: "Logged out".to_string(),
    };
    ([(header::SET_COOKIE, cookie)], Json(response))
}

/// GET /api/me - Report the current session without failing
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Session state", body = MeResponse)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<MeResponse> {
    let principal = session_token(&headers).and_then(|token| state.tokens.validate(token).ok());

    Json(MeResponse {
        success: true,
        authenticated: principal.is_some(),
        user: principal.as_ref().map(UserView::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("tok", 604800, false);
        assert_eq!(
            cookie,
            "auth_token=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=604800"
        );
        assert!(session_cookie("", 0, true).ends_with("Max-Age=0; Secure"));
    }
}
