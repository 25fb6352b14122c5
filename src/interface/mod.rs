// Interface layer: HTTP API, extractors, DTOs

use crate::application::queries::{PermissionTreeReadModel, RoleReadModel};
use crate::domain::permission::PermissionTree;
use crate::domain::user::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub brand_id: String,
    pub permissions: PermissionTree,
    pub granted_count: usize,
    /// RFC 3339 timestamp of the last permission change
    pub updated_at: String,
}

impl From<RoleReadModel> for RoleResponse {
    fn from(role: RoleReadModel) -> Self {
        Self {
            id: role.id,
            name: role.name,
            brand_id: role.brand_id,
            permissions: role.permissions,
            granted_count: role.granted_count,
            updated_at: role.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RolesListResponse {
    pub roles: Vec<RoleResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionTreeResponse {
    pub role_id: String,
    pub brand_id: String,
    pub permissions: PermissionTree,
    pub fully_selected: bool,
}

impl From<PermissionTreeReadModel> for PermissionTreeResponse {
    fn from(model: PermissionTreeReadModel) -> Self {
        Self {
            role_id: model.role_id,
            brand_id: model.brand_id,
            permissions: model.permissions,
            fully_selected: model.fully_selected,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SavePermissionsRequest {
    pub permissions: PermissionTree,
}

/// A toggle applied to a tree the client is still editing.
#[derive(Deserialize, ToSchema)]
pub struct ToggleRequest {
    pub permissions: PermissionTree,
    /// Ids from a root node down to the target node
    pub path: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToggleResponse {
    pub permissions: PermissionTree,
    pub fully_selected: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ToggleRejectedResponse {
    pub error: String,
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectAllRequest {
    pub permissions: PermissionTree,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectAllResponse {
    pub permissions: PermissionTree,
    pub fully_selected: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CapabilityResponse {
    pub capability_id: String,
    pub granted: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    /// `null` detaches the user from their current role
    pub role_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub brand_id: String,
    pub role_id: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            brand_id: user.brand_id,
            role_id: user.role_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod app_state;
pub mod http_handlers;
pub mod routes;

pub use app_state::AppState;
pub use http_handlers::AccessContext;
pub use routes::{ApiDoc, build_router};
