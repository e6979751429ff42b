use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{PermissionValue, Role, RoleCode, RoleDraft, RolePatch, UserId};
use tokio::sync::Mutex;

use crate::authorization_service::{AuthorizationService, RequestContext};
use crate::permission_cache::PermissionCache;
use crate::role_ports::{RoleRepository, RoleUsage};
use crate::user_service::UserRecord;

use super::RoleService;

#[derive(Default)]
struct FakeRoleRepository {
    roles: Mutex<Vec<Role>>,
    usage: Mutex<HashMap<RoleCode, RoleUsage>>,
}

impl FakeRoleRepository {
    async fn set_usage(&self, code: RoleCode, usage: RoleUsage) {
        self.usage.lock().await.insert(code, usage);
    }

    async fn stored(&self, code: &str) -> Option<Role> {
        self.roles
            .lock()
            .await
            .iter()
            .find(|role| role.code.as_str() == code)
            .cloned()
    }
}

#[async_trait]
impl RoleRepository for FakeRoleRepository {
    async fn insert(&self, role: Role) -> AppResult<()> {
        let mut roles = self.roles.lock().await;
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
        let mut roles = self.roles.lock().await;
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
            .lock()
            .await
            .iter()
            .find(|role| &role.code == code)
            .cloned())
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<Role>> {
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

    async fn usage(&self, code: &RoleCode) -> AppResult<RoleUsage> {
        Ok(self
            .usage
            .lock()
            .await
            .get(code)
            .copied()
            .unwrap_or_default())
    }
}

fn admin_role() -> AppResult<Role> {
    let mut role = Role::new(RoleDraft {
        code: "admin".to_owned(),
        name: "Administrator".to_owned(),
        priority: 100,
        permissions: BTreeMap::from([(
            "role.manage".to_owned(),
            PermissionValue::Granted,
        )]),
        ..RoleDraft::default()
    })?;
    role.is_system = true;
    Ok(role)
}

fn custom_role(code: &str, priority: i32) -> AppResult<Role> {
    Role::new(RoleDraft {
        code: code.to_owned(),
        name: code.to_owned(),
        priority,
        ..RoleDraft::default()
    })
}

fn actor(role_codes: &[&str], active: &str) -> AppResult<RequestContext> {
    Ok(RequestContext {
        user: UserRecord {
            id: UserId::new(),
            username: "li.wei".to_owned(),
            display_name: "Li Wei".to_owned(),
            password_hash: None,
            role_codes: role_codes
                .iter()
                .map(|code| RoleCode::new(*code))
                .collect::<AppResult<Vec<_>>>()?,
            is_active: true,
        },
        active_role: Some(RoleCode::new(active)?),
    })
}

struct Harness {
    repository: Arc<FakeRoleRepository>,
    cache: Arc<PermissionCache>,
    service: RoleService,
}

async fn harness(seed: Vec<Role>) -> AppResult<Harness> {
    let repository = Arc::new(FakeRoleRepository::default());
    for role in seed {
        repository.insert(role).await?;
    }

    let cache = Arc::new(PermissionCache::new(repository.clone()));
    cache.invalidate().await?;

    let service = RoleService::new(
        repository.clone(),
        cache.clone(),
        AuthorizationService::new(cache.clone()),
    );

    Ok(Harness {
        repository,
        cache,
        service,
    })
}

#[tokio::test]
async fn actor_without_role_manage_is_forbidden() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("sales", 40)?]).await?;
    let actor = actor(&["sales"], "sales")?;

    let result = harness.service.list_roles(&actor, false).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = harness.service.delete_role(&actor, "sales").await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn created_role_is_visible_to_the_next_permission_check() -> AppResult<()> {
    let harness = harness(vec![admin_role()?]).await?;
    let actor = actor(&["admin"], "admin")?;

    harness
        .service
        .create_role(
            &actor,
            RoleDraft {
                code: "auditor".to_owned(),
                name: "Auditor".to_owned(),
                priority: 20,
                permissions: BTreeMap::from([(
                    "invoice.view".to_owned(),
                    PermissionValue::All,
                )]),
                ..RoleDraft::default()
            },
        )
        .await?;

    let snapshot = harness.cache.snapshot();
    let auditor = RoleCode::new("auditor")?;
    assert_eq!(
        snapshot.permission(&auditor, "invoice.view"),
        PermissionValue::All
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_role_code_is_rejected() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("auditor", 20)?]).await?;
    let actor = actor(&["admin"], "admin")?;

    let result = harness
        .service
        .create_role(
            &actor,
            RoleDraft {
                code: "auditor".to_owned(),
                name: "Auditor".to_owned(),
                priority: 20,
                ..RoleDraft::default()
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Duplicate(_))));
    Ok(())
}

#[tokio::test]
async fn updated_permission_applies_to_the_next_check() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("sales", 40)?]).await?;
    let actor = actor(&["admin"], "admin")?;
    let sales = RoleCode::new("sales")?;

    assert_eq!(
        harness.cache.snapshot().permission(&sales, "project.view"),
        PermissionValue::Denied
    );

    harness
        .service
        .update_role(
            &actor,
            "sales",
            RolePatch {
                permissions: Some(BTreeMap::from([(
                    "project.view".to_owned(),
                    PermissionValue::Sales,
                )])),
                ..RolePatch::default()
            },
        )
        .await?;

    assert_eq!(
        harness.cache.snapshot().permission(&sales, "project.view"),
        PermissionValue::Sales
    );
    Ok(())
}

#[tokio::test]
async fn renaming_a_system_role_code_leaves_the_store_untouched() -> AppResult<()> {
    let harness = harness(vec![admin_role()?]).await?;
    let actor = actor(&["admin"], "admin")?;

    let result = harness
        .service
        .update_role(
            &actor,
            "admin",
            RolePatch {
                code: Some("root".to_owned()),
                name: Some("Root".to_owned()),
                ..RolePatch::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidOperation(_))));

    let stored = harness.repository.stored("admin").await;
    assert!(stored.is_some_and(|role| role.name == "Administrator"));
    Ok(())
}

#[tokio::test]
async fn malformed_patch_code_fails_validation_before_the_store() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("auditor", 20)?]).await?;
    let actor = actor(&["admin"], "admin")?;

    let result = harness
        .service
        .update_role(
            &actor,
            "auditor",
            RolePatch {
                code: Some("Admin-1".to_owned()),
                ..RolePatch::default()
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn system_roles_cannot_be_deleted() -> AppResult<()> {
    let harness = harness(vec![admin_role()?]).await?;
    let actor = actor(&["admin"], "admin")?;

    let result = harness.service.delete_role(&actor, "admin").await;
    assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    assert!(harness.repository.stored("admin").await.is_some());
    Ok(())
}

#[tokio::test]
async fn referenced_role_deletion_reports_the_counts() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("sales", 40)?]).await?;
    let actor = actor(&["admin"], "admin")?;

    harness
        .repository
        .set_usage(
            RoleCode::new("sales")?,
            RoleUsage {
                user_count: 3,
                project_member_count: 0,
                kpi_record_count: 0,
            },
        )
        .await;

    let result = harness.service.delete_role(&actor, "sales").await;
    match result {
        Err(AppError::InUse(message)) => assert!(message.contains("3 user(s)")),
        other => panic!("expected IN_USE, got {other:?}"),
    }
    assert!(harness.repository.stored("sales").await.is_some());
    Ok(())
}

#[tokio::test]
async fn unreferenced_custom_role_is_deleted_and_resolves_denied() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("auditor", 20)?]).await?;
    let actor = actor(&["admin"], "admin")?;

    harness.service.delete_role(&actor, "auditor").await?;

    assert!(harness.repository.stored("auditor").await.is_none());
    let auditor = RoleCode::new("auditor")?;
    assert_eq!(
        harness.cache.snapshot().permission(&auditor, "role.manage"),
        PermissionValue::Denied
    );
    Ok(())
}

#[tokio::test]
async fn usage_for_an_unknown_role_is_not_found() -> AppResult<()> {
    let harness = harness(vec![admin_role()?]).await?;
    let actor = actor(&["admin"], "admin")?;

    let result = harness.service.role_usage(&actor, "ghost").await;
    assert!(matches!(result, Err(AppError::RoleNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn inactive_roles_are_listed_only_on_request() -> AppResult<()> {
    let harness = harness(vec![admin_role()?, custom_role("auditor", 20)?]).await?;
    let actor = actor(&["admin"], "admin")?;

    harness
        .service
        .update_role(
            &actor,
            "auditor",
            RolePatch {
                is_active: Some(false),
                ..RolePatch::default()
            },
        )
        .await?;

    let active_only = harness.service.list_roles(&actor, false).await?;
    assert!(!active_only.iter().any(|role| role.code.as_str() == "auditor"));

    let everything = harness.service.list_roles(&actor, true).await?;
    assert!(everything.iter().any(|role| role.code.as_str() == "auditor"));
    Ok(())
}
