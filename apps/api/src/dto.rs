//! Request and response payloads.

mod auth;
mod roles;

pub use auth::{LoginRequest, LoginResponse, SessionUserResponse};
pub use roles::{
    CreateRoleRequest, ListRolesQuery, RoleResponse, RoleUsageResponse, UpdateRoleRequest,
};
