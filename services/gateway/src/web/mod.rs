pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use self::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the complete HTTP application: public, authenticated and admin
/// routes, the JSON fallback, optional CORS, and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/api/login", post(auth::login_handler))
        .route("/api/logout", post(auth::logout_handler))
        .route("/api/me", get(auth::me_handler))
        .route("/api/status", get(rest::status_handler));

    // Any logged-in user
    let member_routes = Router::new()
        .route("/api/query", post(rest::query_handler))
        .route("/api/documents", get(rest::list_documents_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_authenticated,
        ));

    // Administrators only. The gate runs before the body is read.
    let admin_routes = Router::new()
        .route(
            "/api/upload",
            post(rest::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/documents/{display_name}",
            delete(rest::delete_document_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    let mut api_router = Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .fallback(rest::not_found_handler);

    if let Some(origin) = state.config.allowed_origin.as_deref() {
        match HeaderValue::from_str(origin) {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([CONTENT_TYPE]);
                api_router = api_router.layer(cors);
            }
            Err(_) => warn!("Ignoring unusable ALLOWED_ORIGIN '{}'", origin),
        }
    }

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi()))
        .merge(api_router.with_state(state))
}
