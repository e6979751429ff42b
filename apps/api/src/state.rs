//! Shared application state.

use std::sync::Arc;

use opsdesk_application::{
    AuthTokenService, AuthorizationService, PermissionCache, RoleService, UserService,
};

/// Shared application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Role store administration service.
    pub role_service: RoleService,
    /// Authorization gate over the permission snapshot.
    pub authorization_service: AuthorizationService,
    /// Permission cache backing role binding and resolution.
    pub permission_cache: Arc<PermissionCache>,
    /// Bearer-token lifecycle service.
    pub auth_token_service: AuthTokenService,
    /// User lookup and login service.
    pub user_service: UserService,
}
