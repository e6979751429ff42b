//! Repository ports for the role record store.

use async_trait::async_trait;
use opsdesk_core::AppResult;
use opsdesk_domain::{Role, RoleCode};

/// Reference counts justifying an `IN_USE` deletion rejection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleUsage {
    /// Active users whose owned-role list contains the code.
    pub user_count: u64,
    /// Project membership rows referencing the code.
    pub project_member_count: u64,
    /// KPI records referencing the code.
    pub kpi_record_count: u64,
}

impl RoleUsage {
    /// Returns whether any collaborator still references the role.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.user_count > 0 || self.project_member_count > 0 || self.kpi_record_count > 0
    }
}

/// Repository port for role persistence.
///
/// Listing returns roles sorted by priority descending, then creation order;
/// both adapters share this ordering contract.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Inserts a new role. Fails with `DUPLICATE` on a code collision.
    async fn insert(&self, role: Role) -> AppResult<()>;

    /// Replaces an existing role identified by its code.
    async fn update(&self, role: Role) -> AppResult<()>;

    /// Finds a role by code.
    async fn find(&self, code: &RoleCode) -> AppResult<Option<Role>>;

    /// Lists roles, optionally including deactivated ones.
    async fn list(&self, include_inactive: bool) -> AppResult<Vec<Role>>;

    /// Removes a role by code. The service checks system/usage guards first.
    async fn delete(&self, code: &RoleCode) -> AppResult<()>;

    /// Counts live references to a role code across collaborators.
    async fn usage(&self, code: &RoleCode) -> AppResult<RoleUsage>;
}
