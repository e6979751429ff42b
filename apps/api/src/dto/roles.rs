//! Role administration payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opsdesk_application::RoleUsage;
use opsdesk_core::AppResult;
use opsdesk_domain::{PermissionValue, Role, RoleDraft, RolePatch};
use serde::{Deserialize, Serialize};

/// Query parameters for role listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListRolesQuery {
    /// Include deactivated roles in the listing.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Incoming payload for role creation.
///
/// Permission values arrive as raw JSON so a bad value is reported as a
/// `VALIDATION_ERROR` in the envelope rather than a body-rejection.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    /// Unique role code.
    pub code: String,
    /// Display label.
    pub name: String,
    /// Default-role selection priority.
    #[serde(default)]
    pub priority: i32,
    /// Permission grants keyed by permission key.
    #[serde(default)]
    pub permissions: BTreeMap<String, serde_json::Value>,
    /// Whether project membership may reference this role.
    #[serde(default)]
    pub can_be_project_member: bool,
    /// Whether the KPI subsystem may reference this role.
    #[serde(default)]
    pub can_be_kpi_role: bool,
}

impl CreateRoleRequest {
    /// Validates the raw permission values and builds a domain draft.
    pub fn into_draft(self) -> AppResult<RoleDraft> {
        Ok(RoleDraft {
            code: self.code,
            name: self.name,
            priority: self.priority,
            permissions: parse_permissions(self.permissions)?,
            can_be_project_member: self.can_be_project_member,
            can_be_kpi_role: self.can_be_kpi_role,
        })
    }
}

/// Incoming payload for a partial role update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    /// Requested code; must match the current code.
    pub code: Option<String>,
    /// New display label.
    pub name: Option<String>,
    /// New selection priority.
    pub priority: Option<i32>,
    /// Full replacement permission map.
    pub permissions: Option<BTreeMap<String, serde_json::Value>>,
    /// Activate or deactivate the role.
    pub is_active: Option<bool>,
    /// New project-membership flag.
    pub can_be_project_member: Option<bool>,
    /// New KPI flag.
    pub can_be_kpi_role: Option<bool>,
}

impl UpdateRoleRequest {
    /// Validates the raw permission values and builds a domain patch.
    pub fn into_patch(self) -> AppResult<RolePatch> {
        Ok(RolePatch {
            code: self.code,
            name: self.name,
            priority: self.priority,
            permissions: self.permissions.map(parse_permissions).transpose()?,
            is_active: self.is_active,
            can_be_project_member: self.can_be_project_member,
            can_be_kpi_role: self.can_be_kpi_role,
        })
    }
}

fn parse_permissions(
    raw: BTreeMap<String, serde_json::Value>,
) -> AppResult<BTreeMap<String, PermissionValue>> {
    raw.into_iter()
        .map(|(key, value)| Ok((key, PermissionValue::from_json(&value)?)))
        .collect()
}

/// Role representation returned by the admin surface.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    /// Unique role code.
    pub code: String,
    /// Display label.
    pub name: String,
    /// Default-role selection priority.
    pub priority: i32,
    /// Permission grants in their wire encoding.
    pub permissions: BTreeMap<String, PermissionValue>,
    /// Whether the role participates in resolution.
    pub is_active: bool,
    /// System roles cannot be deleted.
    pub is_system: bool,
    /// Whether project membership may reference this role.
    pub can_be_project_member: bool,
    /// Whether the KPI subsystem may reference this role.
    pub can_be_kpi_role: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            code: role.code.to_string(),
            name: role.name,
            priority: role.priority,
            permissions: role
                .permissions
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
            is_active: role.is_active,
            is_system: role.is_system,
            can_be_project_member: role.can_be_project_member,
            can_be_kpi_role: role.can_be_kpi_role,
            created_at: role.created_at,
        }
    }
}

/// Reference counts for a role code.
#[derive(Debug, Serialize)]
pub struct RoleUsageResponse {
    /// Active users owning the role.
    pub user_count: u64,
    /// Project membership rows referencing the role.
    pub project_member_count: u64,
    /// KPI records referencing the role.
    pub kpi_record_count: u64,
    /// Whether deletion would be rejected with `IN_USE`.
    pub is_referenced: bool,
}

impl From<RoleUsage> for RoleUsageResponse {
    fn from(usage: RoleUsage) -> Self {
        Self {
            user_count: usage.user_count,
            project_member_count: usage.project_member_count,
            kpi_record_count: usage.kpi_record_count,
            is_referenced: usage.is_referenced(),
        }
    }
}
