//! PostgreSQL-backed bearer-token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use opsdesk_application::TokenRepository;
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::UserId;

/// PostgreSQL implementation of the token repository port.
///
/// Expiry is enforced in the lookup query; expired rows are swept
/// opportunistically on insert rather than by a background job.
#[derive(Clone)]
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn insert(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to sweep expired tokens: {error}"))
            })?;

        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id.as_uuid())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to store token: {error}")))?;

        Ok(())
    }

    async fn find_user(&self, token_hash: &str) -> AppResult<Option<UserId>> {
        let user_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT user_id
            FROM auth_tokens
            WHERE token_hash = $1
              AND expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up token: {error}")))?;

        Ok(user_id.map(UserId::from_uuid))
    }

    async fn delete(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete token: {error}")))?;

        Ok(())
    }
}
