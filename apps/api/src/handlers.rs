//! HTTP handlers for the admin and liveness surfaces.

mod health;
mod roles;

pub use health::health_handler;
pub use roles::{
    create_role_handler, delete_role_handler, get_role_handler, list_roles_handler,
    role_usage_handler, update_role_handler,
};
