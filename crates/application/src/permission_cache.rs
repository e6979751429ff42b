//! Read-optimized permission snapshot and its rebuild service.
//!
//! The cache is the only process-wide shared mutable state in the core.
//! Rebuilds construct a complete replacement snapshot off to the side and
//! install it with a single reference swap, so a concurrent reader always
//! sees either the fully-old or fully-new snapshot, never a mix. A failed
//! rebuild leaves the previous snapshot serving: stale-but-consistent beats
//! unavailable.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use opsdesk_core::AppResult;
use opsdesk_domain::{PermissionMap, PermissionValue, Role, RoleCode};

use crate::role_ports::RoleRepository;

/// Immutable point-in-time view of all active role definitions.
#[derive(Debug, Default)]
pub struct PermissionSnapshot {
    permissions_by_role: HashMap<RoleCode, PermissionMap>,
    priority_by_role: HashMap<RoleCode, i32>,
    name_by_role: HashMap<RoleCode, String>,
}

impl PermissionSnapshot {
    /// Creates an empty snapshot resolving every lookup to denied.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from role definitions; inactive roles are skipped.
    #[must_use]
    pub fn from_roles(roles: &[Role]) -> Self {
        let mut snapshot = Self::empty();

        for role in roles.iter().filter(|role| role.is_active) {
            snapshot
                .permissions_by_role
                .insert(role.code.clone(), role.permissions.clone());
            snapshot
                .priority_by_role
                .insert(role.code.clone(), role.priority);
            snapshot
                .name_by_role
                .insert(role.code.clone(), role.name.clone());
        }

        snapshot
    }

    /// Resolves the stored grant for a role and permission key.
    ///
    /// Unknown roles and absent keys resolve to [`PermissionValue::Denied`];
    /// a user's role list may legitimately reference codes with no stored
    /// role, and resolution degrades rather than erroring.
    #[must_use]
    pub fn permission(&self, role: &RoleCode, key: &str) -> PermissionValue {
        self.permissions_by_role
            .get(role)
            .and_then(|permissions| permissions.get(key))
            .copied()
            .unwrap_or(PermissionValue::Denied)
    }

    /// Returns whether the role holds any grant for the key.
    #[must_use]
    pub fn has_permission(&self, role: &RoleCode, key: &str) -> bool {
        self.permission(role, key).is_granted()
    }

    /// Selects the default role from an ordered owned-role list.
    ///
    /// Stable-sorts by priority descending with unknown roles at priority 0,
    /// so equal-priority roles keep their original relative order. The
    /// stability is a deliberate tie-break rule, not a sort accident.
    ///
    /// Candidates are not filtered to snapshot-known roles: an owned code
    /// absent from the snapshot competes at priority 0 and can outrank a
    /// known role with negative priority. The selected code then resolves
    /// every permission to denied, which is the same degraded outcome as
    /// binding no role at all.
    #[must_use]
    pub fn default_role(&self, owned: &[RoleCode]) -> Option<RoleCode> {
        let mut candidates: Vec<&RoleCode> = owned.iter().collect();
        candidates.sort_by_key(|code| {
            Reverse(self.priority_by_role.get(*code).copied().unwrap_or(0))
        });

        candidates.first().map(|code| (*code).clone())
    }

    /// Returns the display name recorded for a role, if known.
    #[must_use]
    pub fn role_name(&self, role: &RoleCode) -> Option<&str> {
        self.name_by_role.get(role).map(String::as_str)
    }

    /// Returns the number of roles in the snapshot.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.permissions_by_role.len()
    }
}

/// Cache service owning the current snapshot.
pub struct PermissionCache {
    repository: Arc<dyn RoleRepository>,
    snapshot: RwLock<Arc<PermissionSnapshot>>,
}

impl PermissionCache {
    /// Creates a cache with an empty snapshot; call [`Self::invalidate`] to
    /// populate it from the role store.
    #[must_use]
    pub fn new(repository: Arc<dyn RoleRepository>) -> Self {
        Self {
            repository,
            snapshot: RwLock::new(Arc::new(PermissionSnapshot::empty())),
        }
    }

    /// Returns the current snapshot.
    ///
    /// The lock is held only long enough to clone the `Arc`; resolver calls
    /// on the returned snapshot never block or suspend.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PermissionSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Rebuilds the snapshot from the role store and installs it atomically.
    ///
    /// On failure the previous snapshot remains installed and valid.
    pub async fn invalidate(&self) -> AppResult<()> {
        let roles = self.repository.list(false).await?;
        let next = Arc::new(PermissionSnapshot::from_roles(&roles));

        *self
            .snapshot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use opsdesk_core::{AppError, AppResult};
    use opsdesk_domain::{PermissionValue, Role, RoleCode, RoleDraft};
    use tokio::sync::Mutex;

    use crate::role_ports::{RoleRepository, RoleUsage};

    use super::{PermissionCache, PermissionSnapshot};

    fn role(code: &str, priority: i32, permissions: &[(&str, PermissionValue)]) -> AppResult<Role> {
        let mut role = Role::new(RoleDraft {
            code: code.to_owned(),
            name: code.to_owned(),
            priority,
            permissions: permissions
                .iter()
                .map(|(key, value)| ((*key).to_owned(), *value))
                .collect::<BTreeMap<_, _>>(),
            ..RoleDraft::default()
        })?;
        role.is_active = true;
        Ok(role)
    }

    fn code(value: &str) -> AppResult<RoleCode> {
        RoleCode::new(value)
    }

    #[derive(Default)]
    struct FakeRoleRepository {
        roles: Mutex<Vec<Role>>,
        fail_listing: AtomicBool,
    }

    #[async_trait]
    impl RoleRepository for FakeRoleRepository {
        async fn insert(&self, role: Role) -> AppResult<()> {
            self.roles.lock().await.push(role);
            Ok(())
        }

        async fn update(&self, role: Role) -> AppResult<()> {
            let mut roles = self.roles.lock().await;
            if let Some(stored) = roles.iter_mut().find(|stored| stored.code == role.code) {
                *stored = role;
            }
            Ok(())
        }

        async fn find(&self, code: &RoleCode) -> AppResult<Option<Role>> {
            Ok(self
                .roles
                .lock()
                .await
                .iter()
                .find(|role| &role.code == code)
                .cloned())
        }

        async fn list(&self, include_inactive: bool) -> AppResult<Vec<Role>> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(AppError::Internal("store unreachable".to_owned()));
            }
            Ok(self
                .roles
                .lock()
                .await
                .iter()
                .filter(|role| include_inactive || role.is_active)
                .cloned()
                .collect())
        }

        async fn delete(&self, code: &RoleCode) -> AppResult<()> {
            self.roles.lock().await.retain(|role| &role.code != code);
            Ok(())
        }

        async fn usage(&self, _code: &RoleCode) -> AppResult<RoleUsage> {
            Ok(RoleUsage::default())
        }
    }

    #[test]
    fn unknown_role_and_key_resolve_to_denied() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role(
            "sales",
            40,
            &[("project.view", PermissionValue::Sales)],
        )?]);

        assert_eq!(
            snapshot.permission(&code("ghost")?, "project.view"),
            PermissionValue::Denied
        );
        assert_eq!(
            snapshot.permission(&code("sales")?, "invoice.view"),
            PermissionValue::Denied
        );
        Ok(())
    }

    #[test]
    fn has_permission_agrees_with_permission() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role(
            "sales",
            40,
            &[
                ("project.view", PermissionValue::Sales),
                ("project.create", PermissionValue::Granted),
                ("invoice.view", PermissionValue::Denied),
            ],
        )?]);

        let sales = code("sales")?;
        for key in ["project.view", "project.create", "invoice.view", "absent.key"] {
            assert_eq!(
                snapshot.has_permission(&sales, key),
                snapshot.permission(&sales, key).is_granted(),
            );
        }
        Ok(())
    }

    #[test]
    fn inactive_roles_are_excluded_from_the_snapshot() -> AppResult<()> {
        let mut disabled = role("pm", 60, &[("project.view", PermissionValue::Assigned)])?;
        disabled.is_active = false;

        let snapshot = PermissionSnapshot::from_roles(&[disabled]);
        assert_eq!(snapshot.role_count(), 0);
        assert!(!snapshot.has_permission(&code("pm")?, "project.view"));
        Ok(())
    }

    #[test]
    fn role_names_are_recorded_for_active_roles() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role("pm", 60, &[])?]);
        assert_eq!(snapshot.role_name(&code("pm")?), Some("pm"));
        assert_eq!(snapshot.role_name(&code("ghost")?), None);
        Ok(())
    }

    #[test]
    fn default_role_of_empty_list_is_none() {
        let snapshot = PermissionSnapshot::empty();
        assert_eq!(snapshot.default_role(&[]), None);
    }

    #[test]
    fn default_role_picks_the_highest_priority() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[
            role("translator", 40, &[])?,
            role("reviewer", 50, &[])?,
        ]);

        let owned = vec![code("translator")?, code("reviewer")?];
        assert_eq!(snapshot.default_role(&owned), Some(code("reviewer")?));
        Ok(())
    }

    #[test]
    fn default_role_is_stable_for_equal_priorities() -> AppResult<()> {
        let snapshot =
            PermissionSnapshot::from_roles(&[role("alpha", 50, &[])?, role("beta", 50, &[])?]);

        let owned = vec![code("beta")?, code("alpha")?];
        // Equal priorities preserve the original order of the owned list.
        assert_eq!(snapshot.default_role(&owned), Some(code("beta")?));

        // Deterministic under repetition.
        for _ in 0..10 {
            assert_eq!(snapshot.default_role(&owned), Some(code("beta")?));
        }
        Ok(())
    }

    #[test]
    fn default_role_treats_unknown_roles_as_priority_zero() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role("pm", 60, &[])?]);

        let owned = vec![code("ghost")?, code("pm")?];
        assert_eq!(snapshot.default_role(&owned), Some(code("pm")?));

        // All-unknown lists fall back to the original first element.
        let unknown = vec![code("ghost")?, code("phantom")?];
        assert_eq!(snapshot.default_role(&unknown), Some(code("ghost")?));
        Ok(())
    }

    #[test]
    fn unknown_role_outranks_a_negative_priority_role() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role("intern", -5, &[])?]);

        // The unknown code competes at priority 0 and wins; it resolves
        // every permission to denied, so nothing is granted by accident.
        let owned = vec![code("intern")?, code("ghost")?];
        let selected = snapshot.default_role(&owned);
        assert_eq!(selected, Some(code("ghost")?));
        assert!(
            selected.is_none_or(|selected| !snapshot.has_permission(&selected, "project.view"))
        );
        Ok(())
    }

    #[test]
    fn default_role_always_returns_an_owned_element() -> AppResult<()> {
        let snapshot = PermissionSnapshot::from_roles(&[role("pm", 60, &[])?]);
        let owned = vec![code("sales")?, code("pm")?, code("ghost")?];

        let selected = snapshot.default_role(&owned);
        assert!(selected.is_some_and(|selected| owned.contains(&selected)));
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_installs_a_complete_replacement_snapshot() -> AppResult<()> {
        let repository = Arc::new(FakeRoleRepository::default());
        let cache = PermissionCache::new(repository.clone());

        repository
            .insert(role("sales", 40, &[("project.view", PermissionValue::Sales)])?)
            .await?;
        cache.invalidate().await?;

        let before = cache.snapshot();
        assert_eq!(
            before.permission(&code("sales")?, "project.view"),
            PermissionValue::Sales
        );

        let mut updated = role("sales", 40, &[("project.view", PermissionValue::All)])?;
        updated.is_active = true;
        repository.update(updated).await?;
        cache.invalidate().await?;

        // The very next read reflects the new value...
        assert_eq!(
            cache.snapshot().permission(&code("sales")?, "project.view"),
            PermissionValue::All
        );
        // ...while a reader holding the old snapshot keeps a consistent view.
        assert_eq!(
            before.permission(&code("sales")?, "project.view"),
            PermissionValue::Sales
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_the_previous_snapshot() -> AppResult<()> {
        let repository = Arc::new(FakeRoleRepository::default());
        let cache = PermissionCache::new(repository.clone());

        repository
            .insert(role("pm", 60, &[("project.view", PermissionValue::Assigned)])?)
            .await?;
        cache.invalidate().await?;

        repository.fail_listing.store(true, Ordering::SeqCst);
        assert!(cache.invalidate().await.is_err());

        // Stale-but-consistent: the earlier snapshot still serves.
        assert!(cache.snapshot().has_permission(&code("pm")?, "project.view"));
        Ok(())
    }
}
