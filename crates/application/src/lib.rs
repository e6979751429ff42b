//! Application services for the role and permission resolution core.
//!
//! Services orchestrate domain rules over repository ports. The permission
//! cache and authorization gate form the hot read path; the role service is
//! the sole write path into the role store and owns cache invalidation.

#![forbid(unsafe_code)]

mod auth_token_service;
mod authorization_service;
mod permission_cache;
mod role_ports;
mod role_service;
mod scope_filter;
mod user_service;

pub use auth_token_service::{AuthTokenService, IssuedToken, TokenRepository};
pub use authorization_service::{
    AuthorizationService, RequestContext, RoleCheckPhase, bind_active_role,
};
pub use permission_cache::{PermissionCache, PermissionSnapshot};
pub use role_ports::{RoleRepository, RoleUsage};
pub use role_service::RoleService;
pub use scope_filter::ScopeFilter;
pub use user_service::{PasswordHasher, UserRecord, UserRepository, UserService};
