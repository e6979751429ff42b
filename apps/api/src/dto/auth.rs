//! Authentication payloads.

use chrono::{DateTime, Utc};
use opsdesk_application::RequestContext;
use opsdesk_domain::RoleCode;
use serde::{Deserialize, Serialize};

/// Incoming payload for username/password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plaintext password, verified against the stored Argon2id hash.
    pub password: String,
}

/// Response for a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Opaque bearer token; shown exactly once.
    pub token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
    /// The authenticated identity.
    pub user: SessionUserResponse,
}

/// Identity payload for login and `/auth/me`.
#[derive(Debug, Serialize)]
pub struct SessionUserResponse {
    /// User identifier.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Owned role codes, in stored order.
    pub roles: Vec<String>,
    /// The role this session is bound to, if any.
    pub active_role: Option<String>,
}

impl From<&RequestContext> for SessionUserResponse {
    fn from(context: &RequestContext) -> Self {
        Self {
            id: context.user.id.to_string(),
            username: context.user.username.clone(),
            display_name: context.user.display_name.clone(),
            roles: context
                .user
                .role_codes
                .iter()
                .map(RoleCode::to_string)
                .collect(),
            active_role: context.active_role.as_ref().map(RoleCode::to_string),
        }
    }
}
