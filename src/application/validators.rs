use crate::application::commands::{CreateRoleCommand, UpdateRolePermissionsCommand};
use crate::domain::permission::PermissionTree;
use crate::domain::role::Role;
use async_trait::async_trait;

pub const MAX_ROLE_NAME_LEN: usize = 100;

/// Validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Field validation failed: {field} - {message}")]
    FieldValidation { field: String, message: String },
    #[error("Business rule violation: {message}")]
    BusinessRule { message: String },
    #[error("Permission tree contains duplicate ids: {}", .0.join(", "))]
    DuplicatePermissionIds(Vec<String>),
}

/// Base trait for command validation
#[async_trait]
pub trait CommandValidator<C>: Send + Sync {
    async fn validate(&self, command: &C) -> Result<(), ValidationError>;
}

/// Role command validation rules
pub struct RoleCommandValidator;

impl RoleCommandValidator {
    /// Validates a role name
    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::FieldValidation {
                field: "name".to_string(),
                message: "Role name cannot be empty".to_string(),
            });
        }
        if name.chars().count() > MAX_ROLE_NAME_LEN {
            return Err(ValidationError::FieldValidation {
                field: "name".to_string(),
                message: format!("Role name must be at most {MAX_ROLE_NAME_LEN} characters"),
            });
        }
        Ok(())
    }

    pub fn validate_id(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::FieldValidation {
                field: field.to_string(),
                message: format!("{field} cannot be empty"),
            });
        }
        Ok(())
    }

    /// Role names are unique within a brand
    pub fn validate_unique_name(existing: &[Role], name: &str) -> Result<(), ValidationError> {
        if existing.iter().any(|r| r.has_name(name)) {
            return Err(ValidationError::BusinessRule {
                message: format!("A role named '{}' already exists in this brand", name.trim()),
            });
        }
        Ok(())
    }

    /// Ids must be unique within one tree instance
    pub fn validate_tree(tree: &PermissionTree) -> Result<(), ValidationError> {
        let duplicates = tree.duplicate_ids();
        if !duplicates.is_empty() {
            return Err(ValidationError::DuplicatePermissionIds(
                duplicates.into_iter().map(str::to_string).collect(),
            ));
        }
        Ok(())
    }
}

/// Create role command validation
pub struct CreateRoleCommandValidator;

#[async_trait]
impl CommandValidator<CreateRoleCommand> for CreateRoleCommandValidator {
    async fn validate(&self, command: &CreateRoleCommand) -> Result<(), ValidationError> {
        RoleCommandValidator::validate_name(&command.name)?;
        RoleCommandValidator::validate_id("brand_id", &command.brand_id)
    }
}

/// Update role permissions command validation
pub struct UpdateRolePermissionsCommandValidator;

#[async_trait]
impl CommandValidator<UpdateRolePermissionsCommand> for UpdateRolePermissionsCommandValidator {
    async fn validate(&self, command: &UpdateRolePermissionsCommand) -> Result<(), ValidationError> {
        RoleCommandValidator::validate_id("role_id", &command.role_id)?;
        RoleCommandValidator::validate_tree(&command.permissions)
    }
}
