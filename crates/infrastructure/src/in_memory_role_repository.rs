//! In-memory role repository for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use opsdesk_application::{RoleRepository, RoleUsage};
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{Role, RoleCode};

/// In-memory implementation of the role repository port.
///
/// Keeps insertion order so the listing contract (priority descending, then
/// creation order) matches the Postgres adapter.
#[derive(Default)]
pub struct InMemoryRoleRepository {
    roles: RwLock<Vec<Role>>,
    usage: RwLock<HashMap<RoleCode, RoleUsage>>,
}

impl InMemoryRoleRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reference counts reported for a role code.
    pub async fn set_usage(&self, code: RoleCode, usage: RoleUsage) {
        self.usage.write().await.insert(code, usage);
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn insert(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|existing| existing.code == role.code) {
            return Err(AppError::Duplicate(format!(
                "role '{}' already exists",
                role.code
            )));
        }
        roles.push(role);
        Ok(())
    }

    async fn update(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        match roles.iter_mut().find(|existing| existing.code == role.code) {
            Some(existing) => {
                *existing = role;
                Ok(())
            }
            None => Err(AppError::RoleNotFound(format!(
                "role '{}' does not exist",
                role.code
            ))),
        }
    }

    async fn find(&self, code: &RoleCode) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|role| &role.code == code)
            .cloned())
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .roles
            .read()
            .await
            .iter()
            .filter(|role| include_inactive || role.is_active)
            .cloned()
            .collect();

        // Stable sort preserves insertion order within a priority band.
        roles.sort_by_key(|role| std::cmp::Reverse(role.priority));
        Ok(roles)
    }

    async fn delete(&self, code: &RoleCode) -> AppResult<()> {
        self.roles.write().await.retain(|role| &role.code != code);
        Ok(())
    }

    async fn usage(&self, code: &RoleCode) -> AppResult<RoleUsage> {
        Ok(self
            .usage
            .read()
            .await
            .get(code)
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_application::RoleRepository;
    use opsdesk_core::{AppError, AppResult};
    use opsdesk_domain::{Role, RoleDraft};

    use super::InMemoryRoleRepository;

    fn role(code: &str, priority: i32) -> AppResult<Role> {
        Role::new(RoleDraft {
            code: code.to_owned(),
            name: code.to_owned(),
            priority,
            ..RoleDraft::default()
        })
    }

    #[tokio::test]
    async fn listing_sorts_by_priority_then_creation_order() -> AppResult<()> {
        let repository = InMemoryRoleRepository::new();
        repository.insert(role("translator", 30)?).await?;
        repository.insert(role("admin", 100)?).await?;
        repository.insert(role("reviewer", 30)?).await?;

        let listed = repository.list(false).await?;
        let codes: Vec<&str> = listed.iter().map(|role| role.code.as_str()).collect();
        assert_eq!(codes, ["admin", "translator", "reviewer"]);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() -> AppResult<()> {
        let repository = InMemoryRoleRepository::new();
        repository.insert(role("sales", 40)?).await?;

        let result = repository.insert(role("sales", 40)?).await;
        assert!(matches!(result, Err(AppError::Duplicate(_))));
        Ok(())
    }

    #[tokio::test]
    async fn inactive_roles_are_filtered_unless_requested() -> AppResult<()> {
        let repository = InMemoryRoleRepository::new();
        let mut dormant = role("dormant", 10)?;
        dormant.is_active = false;
        repository.insert(dormant).await?;
        repository.insert(role("sales", 40)?).await?;

        assert_eq!(repository.list(false).await?.len(), 1);
        assert_eq!(repository.list(true).await?.len(), 2);
        Ok(())
    }
}
