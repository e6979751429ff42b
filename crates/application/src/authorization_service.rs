//! Per-request role binding and the authorization gate.
//!
//! Every request operates under at most one active role, bound once from
//! the caller's credential and optional role selector. The gate checks are
//! pure synchronous reads against the current permission snapshot and never
//! mutate the role store or cache.

use std::sync::Arc;

use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{PermissionValue, RoleCode, UserId};

use crate::permission_cache::{PermissionCache, PermissionSnapshot};
use crate::user_service::UserRecord;

/// Identity and active role attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The authenticated user.
    pub user: UserRecord,
    /// The single role this request is evaluated under.
    ///
    /// `None` when the user owns no roles at all; every permission check
    /// then denies.
    pub active_role: Option<RoleCode>,
}

impl RequestContext {
    /// Returns the requester's user id, for building row-level filters.
    #[must_use]
    pub fn requester_id(&self) -> UserId {
        self.user.id
    }
}

/// Which phase of the dual authorization path satisfied a role check.
///
/// The owned-role fallback is a deliberate compatibility shim that weakens
/// the single-active-role guarantee; keeping the phase observable lets
/// callers and tests see when it fired, and makes the shim removable later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCheckPhase {
    /// The bound active role was in the allowed set.
    ActiveRole,
    /// Only a non-active owned role was in the allowed set.
    OwnedRoleFallback,
}

/// Binds the active role for one request.
///
/// An explicit selector must name an owned role; anything else fails with
/// `ROLE_NOT_OWNED` and never silently falls back to a default. Without a
/// selector the default role is computed from priorities, falling back to
/// the first owned role (which can select a role even when no priority data
/// exists for it).
pub fn bind_active_role(
    snapshot: &PermissionSnapshot,
    owned: &[RoleCode],
    requested: Option<&str>,
) -> AppResult<Option<RoleCode>> {
    match requested {
        Some(raw) => {
            let requested = raw.trim();
            owned
                .iter()
                .find(|code| code.as_str() == requested)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    AppError::RoleNotOwned(format!(
                        "the requested role '{requested}' is not in the caller's owned roles"
                    ))
                })
        }
        None => Ok(snapshot
            .default_role(owned)
            .or_else(|| owned.first().cloned())),
    }
}

/// Read-only authorization gate over the permission snapshot.
#[derive(Clone)]
pub struct AuthorizationService {
    cache: Arc<PermissionCache>,
}

impl AuthorizationService {
    /// Creates a gate bound to the shared permission cache.
    #[must_use]
    pub fn new(cache: Arc<PermissionCache>) -> Self {
        Self { cache }
    }

    /// Passes when the caller holds one of the allowed roles.
    ///
    /// Phase one checks the bound active role; phase two, kept for backward
    /// compatibility, accepts any owned role. The returned phase reports
    /// which one satisfied the check.
    pub fn authorize_any_of(
        &self,
        context: &RequestContext,
        allowed: &[RoleCode],
    ) -> AppResult<RoleCheckPhase> {
        if let Some(active) = &context.active_role
            && allowed.contains(active)
        {
            return Ok(RoleCheckPhase::ActiveRole);
        }

        if context
            .user
            .role_codes
            .iter()
            .any(|code| allowed.contains(code))
        {
            return Ok(RoleCheckPhase::OwnedRoleFallback);
        }

        Err(AppError::Forbidden(format!(
            "user '{}' holds none of the required roles",
            context.user.username
        )))
    }

    /// Requires a grant for the key under the active role.
    ///
    /// Returns the resolved scope value so the caller can feed it straight
    /// into a row-level filter without a second lookup.
    pub fn require_permission(
        &self,
        context: &RequestContext,
        key: &str,
    ) -> AppResult<PermissionValue> {
        let value = self.resolve_scope(context, key);
        if value.is_granted() {
            return Ok(value);
        }

        let active = context
            .active_role
            .as_ref()
            .map_or("<none>", RoleCode::as_str);
        Err(AppError::Forbidden(format!(
            "active role '{active}' lacks permission '{key}'"
        )))
    }

    /// Resolves the scope value for the key under the active role.
    ///
    /// This is the canonical entry point business services use to build
    /// their row-level filters.
    #[must_use]
    pub fn resolve_scope(&self, context: &RequestContext, key: &str) -> PermissionValue {
        match &context.active_role {
            Some(role) => self.cache.snapshot().permission(role, key),
            None => PermissionValue::Denied,
        }
    }
}
