use super::command_bus::CommandHandler;
use super::commands::{
    AssignUserRoleCommand, CreateRoleCommand, DeleteRoleCommand, UpdateRolePermissionsCommand,
};
use super::services::{AccessControlService, AccessError};
use super::validators::{
    CommandValidator, CreateRoleCommandValidator, RoleCommandValidator,
    UpdateRolePermissionsCommandValidator, ValidationError,
};
use crate::domain::role::Role;
use crate::domain::user::User;
use crate::infrastructure::{RepositoryError, RoleRepository, UserRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// Create role command handler
pub struct CreateRoleCommandHandler {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
    validator: CreateRoleCommandValidator,
}

impl CreateRoleCommandHandler {
    pub fn new(role_repo: Arc<dyn RoleRepository + Send + Sync>) -> Self {
        Self {
            role_repo,
            validator: CreateRoleCommandValidator,
        }
    }
}

#[async_trait]
impl CommandHandler<CreateRoleCommand> for CreateRoleCommandHandler {
    type Result = Role;
    type Error = AccessError;

    #[instrument(
        name = "create_role_command_handler",
        skip(self, command),
        fields(command_id = %command.command_id, brand_id = %command.brand_id)
    )]
    async fn handle(&self, command: CreateRoleCommand) -> Result<Self::Result, Self::Error> {
        self.validator.validate(&command).await?;

        let existing = self.role_repo.list_for_brand(&command.brand_id).await?;
        RoleCommandValidator::validate_unique_name(&existing, &command.name)?;

        // The store enforces uniqueness too; a concurrent create surfaces as a conflict.
        let role = match self
            .role_repo
            .create(Role::new(command.name.trim(), &command.brand_id))
            .await
        {
            Ok(role) => role,
            Err(RepositoryError::Conflict(message)) => {
                return Err(ValidationError::BusinessRule { message }.into());
            }
            Err(e) => return Err(e.into()),
        };
        info!(role_id = %role.id, requested_by = ?command.requested_by, "Role created");
        Ok(role)
    }
}

/// Update role permissions command handler
pub struct UpdateRolePermissionsCommandHandler {
    access_service: Arc<AccessControlService>,
    validator: UpdateRolePermissionsCommandValidator,
}

impl UpdateRolePermissionsCommandHandler {
    pub fn new(access_service: Arc<AccessControlService>) -> Self {
        Self {
            access_service,
            validator: UpdateRolePermissionsCommandValidator,
        }
    }
}

#[async_trait]
impl CommandHandler<UpdateRolePermissionsCommand> for UpdateRolePermissionsCommandHandler {
    type Result = Role;
    type Error = AccessError;

    #[instrument(
        name = "update_role_permissions_command_handler",
        skip(self, command),
        fields(command_id = %command.command_id, role_id = %command.role_id)
    )]
    async fn handle(
        &self,
        command: UpdateRolePermissionsCommand,
    ) -> Result<Self::Result, Self::Error> {
        self.validator.validate(&command).await?;
        self.access_service
            .save_permissions(&command.role_id, &command.permissions)
            .await
    }
}

/// Delete role command handler
pub struct DeleteRoleCommandHandler {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
}

impl DeleteRoleCommandHandler {
    pub fn new(
        role_repo: Arc<dyn RoleRepository + Send + Sync>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
    ) -> Self {
        Self {
            role_repo,
            user_repo,
        }
    }
}

#[async_trait]
impl CommandHandler<DeleteRoleCommand> for DeleteRoleCommandHandler {
    type Result = ();
    type Error = AccessError;

    #[instrument(
        name = "delete_role_command_handler",
        skip(self, command),
        fields(command_id = %command.command_id, role_id = %command.role_id)
    )]
    async fn handle(&self, command: DeleteRoleCommand) -> Result<Self::Result, Self::Error> {
        match self.role_repo.delete(&command.role_id).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(AccessError::RoleNotFound(command.role_id));
            }
            Err(e) => return Err(e.into()),
        }
        let detached = self
            .user_repo
            .clear_role_references(&command.role_id)
            .await?;
        info!(detached_users = detached, "Role deleted");
        Ok(())
    }
}

/// Assign user role command handler
pub struct AssignUserRoleCommandHandler {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
}

impl AssignUserRoleCommandHandler {
    pub fn new(
        role_repo: Arc<dyn RoleRepository + Send + Sync>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
    ) -> Self {
        Self {
            role_repo,
            user_repo,
        }
    }
}

#[async_trait]
impl CommandHandler<AssignUserRoleCommand> for AssignUserRoleCommandHandler {
    type Result = User;
    type Error = AccessError;

    #[instrument(
        name = "assign_user_role_command_handler",
        skip(self, command),
        fields(command_id = %command.command_id, user_id = %command.user_id)
    )]
    async fn handle(&self, command: AssignUserRoleCommand) -> Result<Self::Result, Self::Error> {
        let user = self
            .user_repo
            .find_by_id(&command.user_id)
            .await?
            .ok_or_else(|| AccessError::UserNotFound(command.user_id.clone()))?;

        if let Some(role_id) = &command.role_id {
            let role = self
                .role_repo
                .find_by_id(role_id)
                .await?
                .ok_or_else(|| AccessError::RoleNotFound(role_id.clone()))?;
            if !role.belongs_to(&user.brand_id) {
                return Err(AccessError::BrandMismatch {
                    role_id: role.id,
                    brand_id: user.brand_id,
                });
            }
        }

        let user = self
            .user_repo
            .set_role(&command.user_id, command.role_id.as_deref())
            .await?;
        info!(role_id = ?user.role_id, "User role assignment updated");
        Ok(user)
    }
}
