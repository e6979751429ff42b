//! Startup seeding for an empty deployment.
//!
//! The built-in role set is written only when the store has no roles at all;
//! a populated store is never touched, so operator edits to system roles
//! survive restarts.

use std::env;
use std::sync::Arc;

use opsdesk_application::{PasswordHasher, RoleRepository, UserRecord, UserRepository};
use opsdesk_core::AppResult;
use opsdesk_domain::{UserId, default_roles};
use tracing::info;

/// Seeds built-in roles and an optional bootstrap admin account.
pub async fn run(
    role_repository: Arc<dyn RoleRepository>,
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
) -> AppResult<()> {
    seed_roles(role_repository).await?;
    seed_bootstrap_admin(user_repository, password_hasher).await
}

async fn seed_roles(role_repository: Arc<dyn RoleRepository>) -> AppResult<()> {
    if !role_repository.list(true).await?.is_empty() {
        return Ok(());
    }

    let roles = default_roles()?;
    let count = roles.len();
    for role in roles {
        role_repository.insert(role).await?;
    }

    info!(count, "seeded built-in roles into an empty role store");
    Ok(())
}

/// Creates the admin account named by `BOOTSTRAP_ADMIN_USERNAME` and
/// `BOOTSTRAP_ADMIN_PASSWORD` when it does not exist yet. Both variables
/// unset is the normal production case and a silent no-op.
async fn seed_bootstrap_admin(
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
) -> AppResult<()> {
    let Some(username) = env::var("BOOTSTRAP_ADMIN_USERNAME")
        .ok()
        .filter(|value| !value.trim().is_empty())
    else {
        return Ok(());
    };
    let Some(password) = env::var("BOOTSTRAP_ADMIN_PASSWORD")
        .ok()
        .filter(|value| !value.is_empty())
    else {
        return Ok(());
    };

    if user_repository.find_by_username(&username).await?.is_some() {
        return Ok(());
    }

    let admin_code = default_roles()?
        .into_iter()
        .map(|role| role.code)
        .find(|code| code.as_str() == "admin");

    user_repository
        .insert(UserRecord {
            id: UserId::new(),
            username: username.clone(),
            display_name: username.clone(),
            password_hash: Some(password_hasher.hash_password(&password)?),
            role_codes: admin_code.into_iter().collect(),
            is_active: true,
        })
        .await?;

    info!(%username, "created bootstrap admin account");
    Ok(())
}
