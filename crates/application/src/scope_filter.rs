//! Row-level filter contract for business services.
//!
//! A resolved scope value is translated into a data-access restriction by
//! each consuming service. The contract has one hard rule: a denied scope
//! refuses the whole operation instead of degrading to an empty result set.

use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{PermissionValue, UserId};

/// Query restriction derived from a resolved permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    /// No restriction; the caller sees every record.
    Unrestricted,
    /// Restrict to records the requester owns or created.
    CreatedBy(UserId),
    /// Restrict to records the requester created in a sales capacity.
    ///
    /// Evaluates like [`ScopeFilter::CreatedBy`]; the distinct variant
    /// preserves the CRM business meaning for consumers that care.
    SalesCreatedBy(UserId),
    /// Restrict to records whose assignment relation contains the requester.
    AssignedTo(UserId),
}

impl ScopeFilter {
    /// Builds the filter for a resolved scope and requester.
    ///
    /// A `Denied` scope is an error: the operation as a whole must be
    /// refused, exactly as if `has_permission` had returned false.
    pub fn for_scope(scope: PermissionValue, requester: UserId) -> AppResult<Self> {
        match scope {
            PermissionValue::Denied => Err(AppError::Forbidden(
                "permission is denied; refusing to build a row-level filter".to_owned(),
            )),
            PermissionValue::Granted | PermissionValue::All => Ok(Self::Unrestricted),
            PermissionValue::SelfOnly => Ok(Self::CreatedBy(requester)),
            PermissionValue::Sales => Ok(Self::SalesCreatedBy(requester)),
            PermissionValue::Assigned => Ok(Self::AssignedTo(requester)),
        }
    }

    /// Evaluates the filter against one record's ownership data.
    ///
    /// `created_by` is the record's owner/creator; `assignees` its
    /// membership relation. Intended for in-memory consumers; SQL consumers
    /// translate the variants into query predicates instead.
    #[must_use]
    pub fn permits(&self, created_by: UserId, assignees: &[UserId]) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::CreatedBy(requester) | Self::SalesCreatedBy(requester) => {
                created_by == *requester
            }
            Self::AssignedTo(requester) => assignees.contains(requester),
        }
    }
}
