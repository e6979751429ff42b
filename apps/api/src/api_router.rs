//! Route assembly and cross-cutting HTTP layers.

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use opsdesk_core::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{self, ACTIVE_ROLE_HEADER};
use crate::state::AppState;
use crate::{auth, handlers};

/// Builds the full application router.
pub fn build(state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/api/roles",
            get(handlers::list_roles_handler).post(handlers::create_role_handler),
        )
        .route(
            "/api/roles/{code}",
            get(handlers::get_role_handler)
                .put(handlers::update_role_handler)
                .delete(handlers::delete_role_handler),
        )
        .route("/api/roles/{code}/usage", get(handlers::role_usage_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(ACTIVE_ROLE_HEADER),
        ]);

    Ok(Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .merge(protected_routes)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
