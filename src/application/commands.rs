use crate::domain::permission::PermissionTree;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Command to create a role in a brand, seeded with nothing granted
#[derive(Debug, Clone)]
pub struct CreateRoleCommand {
    pub command_id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub brand_id: String,
    pub requested_by: Option<String>,
}

/// Command to replace a role's whole permission tree
#[derive(Debug, Clone)]
pub struct UpdateRolePermissionsCommand {
    pub command_id: String,
    pub timestamp: DateTime<Utc>,
    pub role_id: String,
    pub permissions: PermissionTree,
    pub requested_by: Option<String>,
}

/// Command to delete a role together with its permission list
#[derive(Debug, Clone)]
pub struct DeleteRoleCommand {
    pub command_id: String,
    pub timestamp: DateTime<Utc>,
    pub role_id: String,
}

/// Command to assign (or clear, with `None`) a user's single role
#[derive(Debug, Clone)]
pub struct AssignUserRoleCommand {
    pub command_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub role_id: Option<String>,
    pub requested_by: Option<String>,
}

pub struct CommandFactory;

impl CommandFactory {
    pub fn create_role(
        name: String,
        brand_id: String,
        requested_by: Option<String>,
    ) -> CreateRoleCommand {
        CreateRoleCommand {
            command_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            name,
            brand_id,
            requested_by,
        }
    }

    pub fn update_role_permissions(
        role_id: String,
        permissions: PermissionTree,
        requested_by: Option<String>,
    ) -> UpdateRolePermissionsCommand {
        UpdateRolePermissionsCommand {
            command_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role_id,
            permissions,
            requested_by,
        }
    }

    pub fn delete_role(role_id: String) -> DeleteRoleCommand {
        DeleteRoleCommand {
            command_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role_id,
        }
    }

    pub fn assign_user_role(
        user_id: String,
        role_id: Option<String>,
        requested_by: Option<String>,
    ) -> AssignUserRoleCommand {
        AssignUserRoleCommand {
            command_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id,
            role_id,
            requested_by,
        }
    }
}
