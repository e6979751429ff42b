//! Role administration handlers.
//!
//! Authorization lives in the service layer; handlers only translate
//! between HTTP payloads and domain types.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use opsdesk_application::RequestContext;

use crate::dto::{
    CreateRoleRequest, ListRolesQuery, RoleResponse, RoleUsageResponse, UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Lists roles for `GET /api/roles`.
pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Query(query): Query<ListRolesQuery>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_service
        .list_roles(&context, query.include_inactive)
        .await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Creates a role for `POST /api/roles`.
pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let draft = payload.into_draft()?;
    let role = state.role_service.create_role(&context, draft).await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

/// Fetches one role for `GET /api/roles/{code}`.
pub async fn get_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.role_service.get_role(&context, &code).await?;
    Ok(Json(RoleResponse::from(role)))
}

/// Applies a partial update for `PUT /api/roles/{code}`.
pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let patch = payload.into_patch()?;
    let role = state.role_service.update_role(&context, &code, patch).await?;
    Ok(Json(RoleResponse::from(role)))
}

/// Deletes an unreferenced custom role for `DELETE /api/roles/{code}`.
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
) -> ApiResult<StatusCode> {
    state.role_service.delete_role(&context, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reports reference counts for `GET /api/roles/{code}/usage`.
pub async fn role_usage_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
) -> ApiResult<Json<RoleUsageResponse>> {
    let usage = state.role_service.role_usage(&context, &code).await?;
    Ok(Json(RoleUsageResponse::from(usage)))
}
