use crate::domain::permission::PermissionTree;
use crate::domain::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query to get a role as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRoleByIdQuery {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub role_id: String,
}

/// Query to list the roles of one brand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRolesForBrandQuery {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub brand_id: String,
}

/// Query to get a role's permissions reconciled against the canonical catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRolePermissionTreeQuery {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub role_id: String,
}

/// Query to evaluate one capability against a role's persisted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRoleCapabilityQuery {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub role_id: String,
    pub capability_id: String,
}

/// Query to evaluate one capability for a user through their role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckUserCapabilityQuery {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub capability_id: String,
}

pub struct QueryFactory;

impl QueryFactory {
    pub fn get_role_by_id(role_id: String) -> GetRoleByIdQuery {
        GetRoleByIdQuery {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role_id,
        }
    }

    pub fn list_roles_for_brand(brand_id: String) -> ListRolesForBrandQuery {
        ListRolesForBrandQuery {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            brand_id,
        }
    }

    pub fn get_role_permission_tree(role_id: String) -> GetRolePermissionTreeQuery {
        GetRolePermissionTreeQuery {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role_id,
        }
    }

    pub fn check_role_capability(
        role_id: String,
        capability_id: String,
    ) -> CheckRoleCapabilityQuery {
        CheckRoleCapabilityQuery {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role_id,
            capability_id,
        }
    }

    pub fn check_user_capability(
        user_id: String,
        capability_id: String,
    ) -> CheckUserCapabilityQuery {
        CheckUserCapabilityQuery {
            query_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id,
            capability_id,
        }
    }
}

/// Read model DTOs for query responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleReadModel {
    pub id: String,
    pub name: String,
    pub brand_id: String,
    pub permissions: PermissionTree,
    pub granted_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleReadModel {
    fn from(role: Role) -> Self {
        let granted_count = role.permissions.granted_ids().len();
        Self {
            id: role.id,
            name: role.name,
            brand_id: role.brand_id,
            permissions: role.permissions,
            granted_count,
            updated_at: role.updated_at,
        }
    }
}

/// A role's tree in canonical shape, as shown in the access-control editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionTreeReadModel {
    pub role_id: String,
    pub brand_id: String,
    pub permissions: PermissionTree,
    pub fully_selected: bool,
}
