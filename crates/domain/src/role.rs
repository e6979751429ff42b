//! Role definitions and the non-boolean permission algebra.
//!
//! A permission grant is never just yes/no: scoped values (`all`, `self`,
//! `sales`, `assigned`) tell downstream data-access code which rows the
//! holder may see. The wire encoding is deliberately mixed-type JSON
//! (booleans or one of four strings) for compatibility with existing role
//! documents.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opsdesk_core::{AppError, AppResult, NonEmptyString};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Permission key guarding role administration itself.
///
/// Changing role definitions requires currently holding this permission,
/// which is resolved through the same core being administered.
pub const ROLE_MANAGE_KEY: &str = "role.manage";

/// Unique, immutable role identifier.
///
/// Lowercase alphanumeric with underscores, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleCode(String);

impl RoleCode {
    /// Creates a validated role code.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation("role code must not be empty".to_owned()));
        }

        let mut chars = trimmed.chars();
        let first_is_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let rest_is_valid = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !first_is_letter || !rest_is_valid {
            return Err(AppError::Validation(format!(
                "role code '{trimmed}' must be lowercase alphanumeric with underscores and start with a letter"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying code string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for RoleCode {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RoleCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Dotted permission key, e.g. `project.view`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Creates a validated permission key.
    ///
    /// Each dot-separated segment must be lowercase alphanumeric with
    /// underscores and start with a letter.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "permission key must not be empty".to_owned(),
            ));
        }

        let segments_valid = trimmed.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars.next().is_some_and(|c| c.is_ascii_lowercase())
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });

        if !segments_valid {
            return Err(AppError::Validation(format!(
                "permission key '{trimmed}' must be dot-separated lowercase segments"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for PermissionKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Closed set of permission grant values.
///
/// Wire encoding: `false`, `true`, `"all"`, `"self"`, `"sales"`,
/// `"assigned"`. Any other JSON value is rejected at write time. A key
/// absent from a role's permission map resolves to [`PermissionValue::Denied`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionValue {
    /// Permission denied.
    Denied,
    /// Granted without a row-level scope (action permissions).
    Granted,
    /// Granted over every record.
    All,
    /// Granted over records the requester owns or created.
    SelfOnly,
    /// Granted over records the requester created in a sales capacity.
    Sales,
    /// Granted over records the requester is explicitly assigned to.
    Assigned,
}

impl PermissionValue {
    /// Returns whether this value represents any grant at all.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        !matches!(self, Self::Denied)
    }

    /// Parses a JSON value from the closed encoding set.
    pub fn from_json(value: &serde_json::Value) -> AppResult<Self> {
        match value {
            serde_json::Value::Bool(false) => Ok(Self::Denied),
            serde_json::Value::Bool(true) => Ok(Self::Granted),
            serde_json::Value::String(scope) => Self::from_scope_str(scope).ok_or_else(|| {
                AppError::Validation(format!(
                    "unknown permission scope '{scope}'; expected one of \"all\", \"self\", \"sales\", \"assigned\""
                ))
            }),
            other => Err(AppError::Validation(format!(
                "permission value must be a boolean or scope string, got {other}"
            ))),
        }
    }

    /// Returns the scope label for scoped grants, `None` for plain values.
    #[must_use]
    pub fn scope_label(&self) -> Option<&'static str> {
        match self {
            Self::Denied | Self::Granted => None,
            Self::All => Some("all"),
            Self::SelfOnly => Some("self"),
            Self::Sales => Some("sales"),
            Self::Assigned => Some("assigned"),
        }
    }

    fn from_scope_str(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "self" => Some(Self::SelfOnly),
            "sales" => Some(Self::Sales),
            "assigned" => Some(Self::Assigned),
            _ => None,
        }
    }
}

impl Serialize for PermissionValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Denied => serializer.serialize_bool(false),
            Self::Granted => serializer.serialize_bool(true),
            scoped => match scoped.scope_label() {
                Some(label) => serializer.serialize_str(label),
                None => serializer.serialize_bool(false),
            },
        }
    }
}

impl<'de> Deserialize<'de> for PermissionValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PermissionValueVisitor;

        impl Visitor<'_> for PermissionValueVisitor {
            type Value = PermissionValue;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter
                    .write_str("a boolean or one of \"all\", \"self\", \"sales\", \"assigned\"")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(if value {
                    PermissionValue::Granted
                } else {
                    PermissionValue::Denied
                })
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                PermissionValue::from_scope_str(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(PermissionValueVisitor)
    }
}

/// Mapping from permission keys to grant values.
pub type PermissionMap = BTreeMap<PermissionKey, PermissionValue>;

/// A role definition, the unit of authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Unique identifier, immutable after creation.
    pub code: RoleCode,
    /// Display label; carries no authorization meaning.
    pub name: String,
    /// Higher priority wins default-role selection.
    pub priority: i32,
    /// Permission grants; absent keys resolve to denied.
    pub permissions: PermissionMap,
    /// Soft-disable flag; inactive roles are excluded from resolution.
    pub is_active: bool,
    /// Built-in roles cannot be deleted, only deactivated.
    pub is_system: bool,
    /// Whether project membership may reference this role.
    pub can_be_project_member: bool,
    /// Whether the KPI subsystem may reference this role.
    pub can_be_kpi_role: bool,
    /// Creation timestamp; tie-break for listing order.
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Validates a draft and creates a non-system role.
    pub fn new(draft: RoleDraft) -> AppResult<Self> {
        let code = RoleCode::new(draft.code)?;
        let name = NonEmptyString::new(draft.name)?;
        let permissions = validate_permission_map(draft.permissions)?;

        Ok(Self {
            code,
            name: name.into(),
            priority: draft.priority,
            permissions,
            is_active: true,
            is_system: false,
            can_be_project_member: draft.can_be_project_member,
            can_be_kpi_role: draft.can_be_kpi_role,
            created_at: Utc::now(),
        })
    }

    /// Resolves a permission key against this role's grant map.
    #[must_use]
    pub fn permission(&self, key: &str) -> PermissionValue {
        self.permissions
            .get(key)
            .copied()
            .unwrap_or(PermissionValue::Denied)
    }

    /// Applies a partial update, enforcing code immutability.
    ///
    /// A patch that carries a code different from the current one fails:
    /// with `INVALID_OPERATION` for system roles (renaming built-ins is an
    /// explicit contract violation) and `VALIDATION_ERROR` otherwise, since
    /// the code is immutable for every role. The pattern check runs first so
    /// a malformed code is reported before any store interaction.
    pub fn apply_patch(&mut self, patch: RolePatch) -> AppResult<()> {
        if let Some(code) = patch.code {
            let parsed = RoleCode::new(code)?;
            if parsed != self.code {
                if self.is_system {
                    return Err(AppError::InvalidOperation(format!(
                        "the code of system role '{}' cannot be renamed",
                        self.code
                    )));
                }
                return Err(AppError::Validation(format!(
                    "role code '{}' is immutable after creation",
                    self.code
                )));
            }
        }

        if let Some(name) = patch.name {
            self.name = NonEmptyString::new(name)?.into();
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = validate_permission_map(permissions)?;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(flag) = patch.can_be_project_member {
            self.can_be_project_member = flag;
        }
        if let Some(flag) = patch.can_be_kpi_role {
            self.can_be_kpi_role = flag;
        }

        Ok(())
    }
}

/// Input payload for creating a role.
#[derive(Debug, Clone, Default)]
pub struct RoleDraft {
    /// Requested role code.
    pub code: String,
    /// Display label.
    pub name: String,
    /// Default-role selection priority.
    pub priority: i32,
    /// Permission grants keyed by raw key strings, validated on creation.
    pub permissions: BTreeMap<String, PermissionValue>,
    /// Whether project membership may reference this role.
    pub can_be_project_member: bool,
    /// Whether the KPI subsystem may reference this role.
    pub can_be_kpi_role: bool,
}

/// Partial update for an existing role; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    /// Requested code; must equal the current code (codes are immutable).
    pub code: Option<String>,
    /// New display label.
    pub name: Option<String>,
    /// New selection priority.
    pub priority: Option<i32>,
    /// Full replacement permission map.
    pub permissions: Option<BTreeMap<String, PermissionValue>>,
    /// Activate or deactivate the role.
    pub is_active: Option<bool>,
    /// New project-membership flag.
    pub can_be_project_member: Option<bool>,
    /// New KPI flag.
    pub can_be_kpi_role: Option<bool>,
}

fn validate_permission_map(
    raw: BTreeMap<String, PermissionValue>,
) -> AppResult<PermissionMap> {
    raw.into_iter()
        .map(|(key, value)| Ok((PermissionKey::new(key)?, value)))
        .collect()
}
