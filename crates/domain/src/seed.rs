//! Default role seed data.
//!
//! The legacy static permission table survives only as this generator.
//! It is consulted exclusively by initialization tooling that populates an
//! empty role store; resolution always reads the persisted store.

use std::collections::BTreeMap;

use chrono::Utc;
use opsdesk_core::AppResult;

use crate::role::{PermissionKey, PermissionMap, PermissionValue, Role, RoleCode};

/// Returns the built-in system roles used to seed an empty role store.
///
/// Fails if a seed literal violates the code or key grammar, so a bad
/// literal aborts seeding instead of silently shipping fewer roles.
pub fn default_roles() -> AppResult<Vec<Role>> {
    [
        system_role(
            "admin",
            "Administrator",
            100,
            &[
                ("role.manage", PermissionValue::Granted),
                ("user.manage", PermissionValue::Granted),
                ("project.view", PermissionValue::All),
                ("project.manage", PermissionValue::Granted),
                ("invoice.view", PermissionValue::All),
                ("expense.view", PermissionValue::All),
            ],
            false,
            false,
        ),
        system_role(
            "general_manager",
            "General Manager",
            90,
            &[
                ("project.view", PermissionValue::All),
                ("invoice.view", PermissionValue::All),
                ("expense.view", PermissionValue::All),
                ("expense.approve", PermissionValue::Granted),
            ],
            false,
            false,
        ),
        system_role(
            "pm",
            "Project Manager",
            60,
            &[
                ("project.view", PermissionValue::Assigned),
                ("project.manage", PermissionValue::Assigned),
                ("expense.view", PermissionValue::SelfOnly),
            ],
            true,
            true,
        ),
        system_role(
            "finance",
            "Finance",
            50,
            &[
                ("invoice.view", PermissionValue::All),
                ("expense.view", PermissionValue::All),
                ("expense.approve", PermissionValue::Granted),
            ],
            false,
            false,
        ),
        system_role(
            "sales",
            "Sales",
            40,
            &[
                ("project.view", PermissionValue::Sales),
                ("project.create", PermissionValue::Granted),
                ("customer.view", PermissionValue::SelfOnly),
            ],
            true,
            true,
        ),
        system_role(
            "translator",
            "Translator",
            30,
            &[
                ("project.view", PermissionValue::Assigned),
                ("expense.view", PermissionValue::SelfOnly),
            ],
            true,
            true,
        ),
    ]
    .into_iter()
    .collect()
}

fn system_role(
    code: &str,
    name: &str,
    priority: i32,
    permissions: &[(&str, PermissionValue)],
    can_be_project_member: bool,
    can_be_kpi_role: bool,
) -> AppResult<Role> {
    let code = RoleCode::new(code)?;

    let permissions: PermissionMap = permissions
        .iter()
        .map(|(key, value)| Ok((PermissionKey::new(*key)?, *value)))
        .collect::<AppResult<BTreeMap<_, _>>>()?;

    Ok(Role {
        code,
        name: name.to_owned(),
        priority,
        permissions,
        is_active: true,
        is_system: true,
        can_be_project_member,
        can_be_kpi_role,
        created_at: Utc::now(),
    })
}
