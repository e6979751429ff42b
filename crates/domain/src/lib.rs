//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod role;
mod seed;
mod user;

pub use role::{
    PermissionKey, PermissionMap, PermissionValue, ROLE_MANAGE_KEY, Role, RoleCode, RoleDraft,
    RolePatch,
};
pub use seed::default_roles;
pub use user::UserId;
