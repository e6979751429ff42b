//! Authentication handlers.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, header};
use opsdesk_application::{RequestContext, bind_active_role};
use opsdesk_core::AppError;

use crate::dto::{LoginRequest, LoginResponse, SessionUserResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Verifies credentials and issues a bearer token for `POST /auth/login`.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .user_service
        .login(&payload.username, &payload.password)
        .await?;
    let issued = state.auth_token_service.issue(user.id).await?;

    // Report the role a fresh session would bind to, so clients can
    // preselect it without a second round trip.
    let snapshot = state.permission_cache.snapshot();
    let active_role = bind_active_role(&snapshot, &user.role_codes, None)?;

    let context = RequestContext { user, active_role };
    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: SessionUserResponse::from(&context),
    }))
}

/// Revokes the presented bearer token for `POST /auth/logout`.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let raw_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    state.auth_token_service.revoke(raw_token).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Returns the bound identity for `GET /auth/me`.
pub async fn me_handler(
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<SessionUserResponse>> {
    Ok(Json(SessionUserResponse::from(&context)))
}
