//! Shared primitives for all Rust crates in Opsdesk.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Opsdesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Application error categories with the stable codes of the API envelope.
///
/// Identity errors (401) and authorization errors (403) are always terminal
/// and never retried; role-store validation errors are returned synchronously
/// from administrative mutations with enough detail for an operator to act.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Write operation collides with an existing unique value.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Requested role does not exist in the role store.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation is structurally forbidden for this record.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Record is still referenced and cannot be removed.
    #[error("in use: {0}")]
    InUse(String),

    /// Caller presented no usable credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller presented a malformed, unknown or expired credential.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Credential references a user that no longer exists.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Credential references a disabled user account.
    #[error("user disabled: {0}")]
    UserDisabled(String),

    /// Caller requested an active role outside their owned-role list.
    #[error("role not owned: {0}")]
    RoleNotOwned(String),

    /// Caller is authenticated but blocked by authorization policy.
    #[error("insufficient permissions: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error code reported in the API envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Duplicate(_) => "DUPLICATE",
            Self::RoleNotFound(_) => "ROLE_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::InUse(_) => "IN_USE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::UserDisabled(_) => "USER_DISABLED",
            Self::RoleNotOwned(_) => "ROLE_NOT_OWNED",
            Self::Forbidden(_) => "INSUFFICIENT_PERMISSIONS",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code associated with this error category.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidOperation(_) => 400,
            Self::Unauthorized(_)
            | Self::InvalidToken(_)
            | Self::UserNotFound(_)
            | Self::UserDisabled(_) => 401,
            Self::RoleNotOwned(_) | Self::Forbidden(_) => 403,
            Self::RoleNotFound(_) | Self::NotFound(_) => 404,
            Self::Duplicate(_) | Self::InUse(_) => 409,
            Self::Internal(_) => 500,
        }
    }
}
