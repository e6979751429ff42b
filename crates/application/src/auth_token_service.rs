//! Opaque bearer-token issuance and verification.
//!
//! Tokens are 32 random bytes, hex-encoded for transport. Only the SHA-256
//! hash is persisted, so a leaked token table cannot be replayed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::UserId;

/// Repository port for token persistence.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Stores a token hash with its owner and expiry.
    async fn insert(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Resolves an unexpired token hash to its owner.
    async fn find_user(&self, token_hash: &str) -> AppResult<Option<UserId>>;

    /// Removes a token hash; unknown hashes are a no-op.
    async fn delete(&self, token_hash: &str) -> AppResult<()>;
}

/// A freshly issued bearer token; the raw value is returned exactly once.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Raw hex token handed to the client.
    pub token: String,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Application service for bearer-token lifecycle.
#[derive(Clone)]
pub struct AuthTokenService {
    repository: Arc<dyn TokenRepository>,
    ttl: Duration,
}

impl AuthTokenService {
    /// Creates a token service with the given token lifetime.
    #[must_use]
    pub fn new(repository: Arc<dyn TokenRepository>, ttl_hours: i64) -> Self {
        Self {
            repository,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issues a new token for a user.
    pub async fn issue(&self, user_id: UserId) -> AppResult<IssuedToken> {
        let (raw_token, token_hash) = generate_token()?;
        let expires_at = Utc::now() + self.ttl;

        self.repository
            .insert(&token_hash, user_id, expires_at)
            .await?;

        Ok(IssuedToken {
            token: raw_token,
            expires_at,
        })
    }

    /// Verifies a raw bearer token and returns its owner.
    ///
    /// Unknown and expired tokens are indistinguishable to the caller; both
    /// yield `INVALID_TOKEN`.
    pub async fn verify(&self, raw_token: &str) -> AppResult<UserId> {
        let token_hash = hash_token(raw_token);

        self.repository
            .find_user(&token_hash)
            .await?
            .ok_or_else(|| {
                AppError::InvalidToken("bearer token is unknown or expired".to_owned())
            })
    }

    /// Revokes a raw bearer token.
    pub async fn revoke(&self, raw_token: &str) -> AppResult<()> {
        self.repository.delete(&hash_token(raw_token)).await
    }
}

/// Generates a cryptographically random token and its SHA-256 hash.
///
/// Returns `(raw_token_hex, sha256_hash_hex)`.
fn generate_token() -> AppResult<(String, String)> {
    use std::fmt::Write;

    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate bearer token: {error}")))?;

    let raw_token = bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        });

    let hash = hash_token(&raw_token);
    Ok((raw_token, hash))
}

/// Computes the SHA-256 hash of a token string for storage.
fn hash_token(raw_token: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    let result = hasher.finalize();

    result
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
