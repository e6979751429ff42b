//! User lookup and authentication service.
//!
//! The user entity is referenced, not owned, by the authorization core: the
//! owned-role list is stored on the user and is not validated against the
//! role store at write time. Login follows OWASP guidance on generic error
//! messages and hashing even for unknown usernames.

use std::sync::Arc;

use async_trait::async_trait;
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{RoleCode, UserId};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// User record returned by repository queries.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Display name shown to other users.
    pub display_name: String,
    /// Argon2id password hash, or `None` for provisioned-only accounts.
    pub password_hash: Option<String>,
    /// Ordered owned-role list; may reference codes with no stored role.
    pub role_codes: Vec<RoleCode>,
    /// Disabled accounts fail authentication with `USER_DISABLED`.
    pub is_active: bool,
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by their unique identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Finds a user by login name (case-sensitive).
    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>>;

    /// Creates a new user record; used by provisioning and seeding.
    async fn insert(&self, user: UserRecord) -> AppResult<()>;
}

/// Port for password hashing. Keeps the application layer free of direct
/// cryptographic library coupling.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for user lookups and password authentication.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates a user service from repository and hasher implementations.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    /// Authenticates a user with username and password.
    ///
    /// Every failure path (unknown username, wrong password, disabled
    /// account) returns the same generic `UNAUTHORIZED` error to prevent
    /// account enumeration.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<UserRecord> {
        let generic_failure =
            || AppError::Unauthorized("invalid username or password".to_owned());

        let Some(user) = self.user_repository.find_by_username(username).await? else {
            // Hash anyway so unknown usernames cost the same as known ones.
            let _ = self.password_hasher.hash_password(password);
            return Err(generic_failure());
        };

        if !user.is_active {
            let _ = self.password_hasher.hash_password(password);
            return Err(generic_failure());
        }

        let Some(ref stored_hash) = user.password_hash else {
            let _ = self.password_hasher.hash_password(password);
            return Err(generic_failure());
        };

        if !self.password_hasher.verify_password(password, stored_hash)? {
            return Err(generic_failure());
        }

        Ok(user)
    }

    /// Loads the user a verified credential refers to.
    ///
    /// Distinguishes the terminal identity errors of the request pipeline:
    /// a vanished user yields `USER_NOT_FOUND`, a disabled one
    /// `USER_DISABLED`. Both are 401 and never retried.
    pub async fn require_active_user(&self, user_id: UserId) -> AppResult<UserRecord> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::UserNotFound(format!("user '{user_id}' no longer exists"))
            })?;

        if !user.is_active {
            return Err(AppError::UserDisabled(format!(
                "user '{}' is disabled",
                user.username
            )));
        }

        Ok(user)
    }
}
