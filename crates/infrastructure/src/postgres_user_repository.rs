//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use sqlx::PgPool;

use opsdesk_application::{UserRecord, UserRepository};
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{RoleCode, UserId};

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    username: String,
    display_name: String,
    password_hash: Option<String>,
    role_codes: serde_json::Value,
    is_active: bool,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        // Codes that fail validation would also fail resolution; reject the
        // row instead of silently dropping entries.
        let role_codes: Vec<RoleCode> =
            serde_json::from_value(row.role_codes).map_err(|error| {
                AppError::Internal(format!(
                    "stored role codes for user '{}' are malformed: {error}",
                    row.username
                ))
            })?;

        Ok(Self {
            id: UserId::from_uuid(row.id),
            username: row.username,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role_codes,
            is_active: row.is_active,
        })
    }
}

const USER_COLUMNS: &str = "id, username, display_name, password_hash, role_codes, is_active";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_users WHERE id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn insert(&self, user: UserRecord) -> AppResult<()> {
        let role_codes = serde_json::to_value(&user.role_codes).map_err(|error| {
            AppError::Internal(format!("failed to serialize role codes: {error}"))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO app_users (id, username, display_name, password_hash, role_codes, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(&role_codes)
        .bind(user.is_active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Duplicate(format!(
                        "username '{}' is already taken",
                        user.username
                    )));
                }

                Err(AppError::Internal(format!("failed to insert user: {error}")))
            }
        }
    }
}
