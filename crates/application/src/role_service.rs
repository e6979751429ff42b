//! Administrative role-store service.
//!
//! Every operation is gated by the `role.manage` permission resolved
//! against the actor's own active role, through the same core being
//! administered. Every successful mutation rebuilds the permission cache
//! before returning, so the invalidation cannot be forgotten at call sites.

use std::sync::Arc;

use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{ROLE_MANAGE_KEY, Role, RoleCode, RoleDraft, RolePatch};

use crate::authorization_service::{AuthorizationService, RequestContext};
use crate::permission_cache::PermissionCache;
use crate::role_ports::{RoleRepository, RoleUsage};

/// Application service for role administration.
#[derive(Clone)]
pub struct RoleService {
    repository: Arc<dyn RoleRepository>,
    cache: Arc<PermissionCache>,
    authorization: AuthorizationService,
}

impl RoleService {
    /// Creates the service from its repository, cache and gate.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        cache: Arc<PermissionCache>,
        authorization: AuthorizationService,
    ) -> Self {
        Self {
            repository,
            cache,
            authorization,
        }
    }

    /// Lists roles sorted by priority descending, then creation order.
    pub async fn list_roles(
        &self,
        actor: &RequestContext,
        include_inactive: bool,
    ) -> AppResult<Vec<Role>> {
        self.require_role_manage(actor)?;
        self.repository.list(include_inactive).await
    }

    /// Returns one role by code.
    pub async fn get_role(&self, actor: &RequestContext, code: &str) -> AppResult<Role> {
        self.require_role_manage(actor)?;
        let code = RoleCode::new(code)?;
        self.find_existing(&code).await
    }

    /// Creates a role and rebuilds the permission cache.
    pub async fn create_role(&self, actor: &RequestContext, draft: RoleDraft) -> AppResult<Role> {
        self.require_role_manage(actor)?;

        let role = Role::new(draft)?;
        self.repository.insert(role.clone()).await?;
        self.refresh_cache().await;

        Ok(role)
    }

    /// Applies a partial update and rebuilds the permission cache.
    ///
    /// All patch validation happens before the store is touched; a
    /// malformed patch never causes a partial write.
    pub async fn update_role(
        &self,
        actor: &RequestContext,
        code: &str,
        patch: RolePatch,
    ) -> AppResult<Role> {
        self.require_role_manage(actor)?;

        let code = RoleCode::new(code)?;
        let mut role = self.find_existing(&code).await?;
        role.apply_patch(patch)?;

        self.repository.update(role.clone()).await?;
        self.refresh_cache().await;

        Ok(role)
    }

    /// Deletes a role after the system and reference guards pass.
    ///
    /// System roles can never be deleted, regardless of usage counts; they
    /// can only be deactivated. Referenced roles are rejected with the
    /// counts in the message so an operator can resolve the references.
    pub async fn delete_role(&self, actor: &RequestContext, code: &str) -> AppResult<()> {
        self.require_role_manage(actor)?;

        let code = RoleCode::new(code)?;
        let role = self.find_existing(&code).await?;

        if role.is_system {
            return Err(AppError::InvalidOperation(format!(
                "system role '{code}' cannot be deleted; deactivate it instead"
            )));
        }

        let usage = self.repository.usage(&code).await?;
        if usage.is_referenced() {
            return Err(AppError::InUse(format!(
                "role '{code}' is still referenced by {} user(s), {} project member(s) and {} KPI record(s)",
                usage.user_count, usage.project_member_count, usage.kpi_record_count
            )));
        }

        self.repository.delete(&code).await?;
        self.refresh_cache().await;

        Ok(())
    }

    /// Returns reference counts for a role code.
    pub async fn role_usage(&self, actor: &RequestContext, code: &str) -> AppResult<RoleUsage> {
        self.require_role_manage(actor)?;

        let code = RoleCode::new(code)?;
        self.find_existing(&code).await?;
        self.repository.usage(&code).await
    }

    fn require_role_manage(&self, actor: &RequestContext) -> AppResult<()> {
        self.authorization
            .require_permission(actor, ROLE_MANAGE_KEY)
            .map(|_| ())
    }

    async fn find_existing(&self, code: &RoleCode) -> AppResult<Role> {
        self.repository.find(code).await?.ok_or_else(|| {
            AppError::RoleNotFound(format!("role '{code}' does not exist"))
        })
    }

    // A failed rebuild must not fail the mutation that triggered it: the
    // write is durable and the previous snapshot stays valid until the next
    // successful rebuild.
    async fn refresh_cache(&self) {
        if let Err(error) = self.cache.invalidate().await {
            tracing::warn!(%error, "permission cache rebuild failed; serving previous snapshot");
        }
    }
}

#[cfg(test)]
mod tests;
