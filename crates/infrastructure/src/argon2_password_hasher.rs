//! Argon2id adapter for the password hasher port.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use opsdesk_application::PasswordHasher as PasswordHasherPort;
use opsdesk_core::{AppError, AppResult};

// OWASP Password Storage Cheat Sheet: m=19456 KiB, t=2, p=1.
const MEMORY_KIB: u32 = 19_456;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

/// Argon2id password hasher with OWASP-recommended parameters.
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher;

impl Argon2PasswordHasher {
    /// Creates the hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn context() -> Argon2<'static> {
        let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None)
            .unwrap_or_else(|_| Params::default());
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

        Self::context()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|error| {
            AppError::Internal(format!("stored password hash is malformed: {error}"))
        })?;

        match Self::context().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "password verification failed: {error}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_application::PasswordHasher as _;
    use opsdesk_core::AppResult;

    use super::Argon2PasswordHasher;

    #[test]
    fn hash_and_verify_round_trip() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        let hash = hasher.hash_password("s3cret-passphrase")?;

        assert!(hasher.verify_password("s3cret-passphrase", &hash)?);
        assert!(!hasher.verify_password("wrong-password", &hash)?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        let first = hasher.hash_password("s3cret-passphrase")?;
        let second = hasher.hash_password("s3cret-passphrase")?;

        assert_ne!(first, second);
        Ok(())
    }
}
