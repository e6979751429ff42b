//! Role-binding authentication middleware.
//!
//! Terminal in every path: a request either reaches its handler carrying a
//! complete `RequestContext` extension, or is rejected with the envelope
//! code for the first failed step.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use opsdesk_application::{RequestContext, bind_active_role};
use opsdesk_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

/// Header selecting the active role for this request.
pub const ACTIVE_ROLE_HEADER: &str = "x-active-role";

/// Authenticates the bearer token and binds the active role.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let bearer = bearer_token(&request)?;
    let user_id = state.auth_token_service.verify(&bearer).await?;
    let user = state.user_service.require_active_user(user_id).await?;

    let requested_role = request
        .headers()
        .get(ACTIVE_ROLE_HEADER)
        .map(|value| {
            value.to_str().map(str::to_owned).map_err(|_| {
                AppError::Validation(format!(
                    "{ACTIVE_ROLE_HEADER} header is not valid UTF-8"
                ))
            })
        })
        .transpose()?;

    let snapshot = state.permission_cache.snapshot();
    let active_role = bind_active_role(&snapshot, &user.role_codes, requested_role.as_deref())?;

    request
        .extensions_mut()
        .insert(RequestContext { user, active_role });
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<String, AppError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let raw = header_value
        .to_str()
        .map_err(|_| AppError::InvalidToken("authorization header is malformed".to_owned()))?;

    raw.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            AppError::InvalidToken("authorization header must use the Bearer scheme".to_owned())
        })
}
