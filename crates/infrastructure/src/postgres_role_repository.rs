//! PostgreSQL-backed role repository.

use async_trait::async_trait;
use sqlx::PgPool;

use opsdesk_application::{RoleRepository, RoleUsage};
use opsdesk_core::{AppError, AppResult};
use opsdesk_domain::{PermissionMap, Role, RoleCode};

/// PostgreSQL implementation of the role repository port.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    code: String,
    name: String,
    priority: i32,
    permissions: serde_json::Value,
    is_active: bool,
    is_system: bool,
    can_be_project_member: bool,
    can_be_kpi_role: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> AppResult<Self> {
        let permissions: PermissionMap =
            serde_json::from_value(row.permissions).map_err(|error| {
                AppError::Internal(format!(
                    "stored permissions for role '{}' are malformed: {error}",
                    row.code
                ))
            })?;

        Ok(Self {
            code: RoleCode::new(row.code)?,
            name: row.name,
            priority: row.priority,
            permissions,
            is_active: row.is_active,
            is_system: row.is_system,
            can_be_project_member: row.can_be_project_member,
            can_be_kpi_role: row.can_be_kpi_role,
            created_at: row.created_at,
        })
    }
}

fn permissions_json(role: &Role) -> AppResult<serde_json::Value> {
    serde_json::to_value(&role.permissions).map_err(|error| {
        AppError::Internal(format!(
            "failed to serialize permissions for role '{}': {error}",
            role.code
        ))
    })
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn insert(&self, role: Role) -> AppResult<()> {
        let permissions = permissions_json(&role)?;

        let result = sqlx::query(
            r#"
            INSERT INTO app_roles (
                code, name, priority, permissions,
                is_active, is_system, can_be_project_member, can_be_kpi_role,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(role.code.as_str())
        .bind(&role.name)
        .bind(role.priority)
        .bind(&permissions)
        .bind(role.is_active)
        .bind(role.is_system)
        .bind(role.can_be_project_member)
        .bind(role.can_be_kpi_role)
        .bind(role.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Duplicate(format!(
                        "role '{}' already exists",
                        role.code
                    )));
                }

                Err(AppError::Internal(format!("failed to insert role: {error}")))
            }
        }
    }

    async fn update(&self, role: Role) -> AppResult<()> {
        let permissions = permissions_json(&role)?;

        let result = sqlx::query(
            r#"
            UPDATE app_roles
            SET name = $2,
                priority = $3,
                permissions = $4,
                is_active = $5,
                can_be_project_member = $6,
                can_be_kpi_role = $7
            WHERE code = $1
            "#,
        )
        .bind(role.code.as_str())
        .bind(&role.name)
        .bind(role.priority)
        .bind(&permissions)
        .bind(role.is_active)
        .bind(role.can_be_project_member)
        .bind(role.can_be_kpi_role)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update role: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::RoleNotFound(format!(
                "role '{}' does not exist",
                role.code
            )));
        }

        Ok(())
    }

    async fn find(&self, code: &RoleCode) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT code, name, priority, permissions,
                   is_active, is_system, can_be_project_member, can_be_kpi_role,
                   created_at
            FROM app_roles
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        row.map(Role::try_from).transpose()
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT code, name, priority, permissions,
                   is_active, is_system, can_be_project_member, can_be_kpi_role,
                   created_at
            FROM app_roles
            WHERE is_active OR $1
            ORDER BY priority DESC, created_at ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn delete(&self, code: &RoleCode) -> AppResult<()> {
        sqlx::query("DELETE FROM app_roles WHERE code = $1")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        Ok(())
    }

    async fn usage(&self, code: &RoleCode) -> AppResult<RoleUsage> {
        let user_count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM app_users
            WHERE is_active
              AND role_codes @> jsonb_build_array($1::text)
            "#,
        )
        .bind(code.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count role users: {error}")))?;

        let project_member_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM project_members WHERE role_code = $1",
        )
        .bind(code.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count project members: {error}"))
        })?;

        let kpi_record_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM kpi_records WHERE role_code = $1",
        )
        .bind(code.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count KPI records: {error}")))?;

        Ok(RoleUsage {
            user_count: u64::try_from(user_count).unwrap_or_default(),
            project_member_count: u64::try_from(project_member_count).unwrap_or_default(),
            kpi_record_count: u64::try_from(kpi_record_count).unwrap_or_default(),
        })
    }
}
