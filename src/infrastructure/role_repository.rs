use crate::domain::permission::PermissionTree;
use crate::domain::role::Role;
use crate::infrastructure::{RepoResult, RepositoryError, RoleRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Mutex;
use tracing::{error, instrument};

#[derive(Debug, FromRow)]
struct RoleRow {
    id: String,
    name: String,
    brand_id: String,
    permissions: Json<PermissionTree>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            brand_id: row.brand_id,
            permissions: row.permissions.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Maps a unique index violation (SQLSTATE 23505) to `Conflict`.
fn unique_violation_as_conflict(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
            db.constraint().unwrap_or("unique violation").to_string(),
        ),
        _ => RepositoryError::Database(e),
    }
}

const ROLE_COLUMNS: &str = "id, name, brand_id, permissions, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresRoleRepository {
    pub pool: PgPool,
}

impl PostgresRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, role_id: &str) -> RepoResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Role::from))
    }

    #[instrument(skip(self))]
    async fn list_for_brand(&self, brand_id: &str) -> RepoResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE brand_id = $1 ORDER BY name"
        ))
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self, role), fields(role_id = %role.id, brand_id = %role.brand_id))]
    async fn create(&self, role: Role) -> RepoResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "INSERT INTO roles (id, name, brand_id, permissions, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ROLE_COLUMNS}"
        ))
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.brand_id)
        .bind(Json(&role.permissions))
        .bind(role.created_at)
        .bind(role.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation_as_conflict)
        .inspect_err(|e| error!(error = %e, "Failed to create role"))?;
        Ok(row.into())
    }

    #[instrument(skip(self, permissions))]
    async fn update_permissions(
        &self,
        role_id: &str,
        permissions: &PermissionTree,
    ) -> RepoResult<Role> {
        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "UPDATE roles SET permissions = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(Json(permissions))
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to update role permissions"))?;
        row.map(Role::from).ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn delete(&self, role_id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

pub struct InMemoryRoleRepository {
    pub roles: Mutex<Vec<Role>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self::with_roles(vec![])
    }

    pub fn with_roles(roles: Vec<Role>) -> Self {
        Self {
            roles: Mutex::new(roles),
        }
    }
}

impl Default for InMemoryRoleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn find_by_id(&self, role_id: &str) -> RepoResult<Option<Role>> {
        let roles = self.roles.lock().map_err(|_| RepositoryError::Poisoned)?;
        Ok(roles.iter().find(|r| r.id == role_id).cloned())
    }

    async fn list_for_brand(&self, brand_id: &str) -> RepoResult<Vec<Role>> {
        let roles = self.roles.lock().map_err(|_| RepositoryError::Poisoned)?;
        let mut result: Vec<Role> = roles
            .iter()
            .filter(|r| r.belongs_to(brand_id))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn create(&self, role: Role) -> RepoResult<Role> {
        let mut roles = self.roles.lock().map_err(|_| RepositoryError::Poisoned)?;
        if roles
            .iter()
            .any(|r| r.belongs_to(&role.brand_id) && r.has_name(&role.name))
        {
            return Err(RepositoryError::Conflict(format!(
                "role '{}' already exists in brand {}",
                role.name, role.brand_id
            )));
        }
        roles.push(role.clone());
        Ok(role)
    }

    async fn update_permissions(
        &self,
        role_id: &str,
        permissions: &PermissionTree,
    ) -> RepoResult<Role> {
        let mut roles = self.roles.lock().map_err(|_| RepositoryError::Poisoned)?;
        let role = roles
            .iter_mut()
            .find(|r| r.id == role_id)
            .ok_or(RepositoryError::NotFound)?;
        role.replace_permissions(permissions.clone());
        Ok(role.clone())
    }

    async fn delete(&self, role_id: &str) -> RepoResult<()> {
        let mut roles = self.roles.lock().map_err(|_| RepositoryError::Poisoned)?;
        let before = roles.len();
        roles.retain(|r| r.id != role_id);
        if roles.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
