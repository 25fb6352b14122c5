use crate::application::validators::ValidationError;
use crate::domain::permission::{PermissionTree, ToggleRejection};
use crate::domain::permission_catalog::canonical_tree;
use crate::domain::role::Role;
use crate::domain::user::User;
use crate::infrastructure::{RepositoryError, RoleRepository, UserRepository};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Errors surfaced by access-control use cases.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Role not found: {0}")]
    RoleNotFound(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Role {role_id} does not belong to brand {brand_id}")]
    BrandMismatch { role_id: String, brand_id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Persistence failure: {0}")]
    Repository(#[from] RepositoryError),
}

/// Editing session for one role's permission tree.
///
/// Holds the working tree explicitly instead of relying on ambient
/// "current role" state. Every change swaps in a new tree produced by the
/// pure tree operations.
#[derive(Debug, Clone)]
pub struct PermissionEditor {
    role_id: String,
    brand_id: String,
    tree: PermissionTree,
    dirty: bool,
}

impl PermissionEditor {
    /// Opens a session on the role's grants reconciled with the canonical catalog.
    pub fn open(role: &Role) -> Self {
        Self {
            role_id: role.id.clone(),
            brand_id: role.brand_id.clone(),
            tree: role.reconciled_permissions(),
            dirty: false,
        }
    }

    pub fn role_id(&self) -> &str {
        &self.role_id
    }

    pub fn brand_id(&self) -> &str {
        &self.brand_id
    }

    pub fn tree(&self) -> &PermissionTree {
        &self.tree
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_fully_selected(&self) -> bool {
        self.tree.is_fully_selected()
    }

    /// Toggles the node at `path`. A rejected toggle leaves the session untouched.
    pub fn toggle<S: AsRef<str>>(&mut self, path: &[S]) -> Result<(), ToggleRejection> {
        self.tree = toggle_working_tree(&self.tree, path)?;
        self.dirty = true;
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.tree = self.tree.select_all_toggled();
        self.dirty = true;
    }
}

/// Applies one toggle to a client-held working tree, reconciled to canonical shape first.
pub fn toggle_working_tree<S: AsRef<str>>(
    tree: &PermissionTree,
    path: &[S],
) -> Result<PermissionTree, ToggleRejection> {
    PermissionTree::merge(canonical_tree(), tree)
        .toggled(path)
        .inspect_err(|rejection| warn!(%rejection, "Permission toggle rejected"))
}

/// Select-all on a client-held working tree, reconciled to canonical shape first.
pub fn select_all_working_tree(tree: &PermissionTree) -> PermissionTree {
    PermissionTree::merge(canonical_tree(), tree).select_all_toggled()
}

/// Loads, saves and evaluates role permission trees.
pub struct AccessControlService {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
}

impl AccessControlService {
    pub fn new(
        role_repo: Arc<dyn RoleRepository + Send + Sync>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
    ) -> Self {
        Self {
            role_repo,
            user_repo,
        }
    }

    async fn load_role(&self, role_id: &str) -> Result<Role, AccessError> {
        self.role_repo
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| AccessError::RoleNotFound(role_id.to_string()))
    }

    /// Fetches a role and merges its saved grants into the canonical tree.
    #[instrument(name = "open_permission_editor", skip(self))]
    pub async fn open_editor(&self, role_id: &str) -> Result<PermissionEditor, AccessError> {
        let role = self.load_role(role_id).await?;
        Ok(PermissionEditor::open(&role))
    }

    /// Persists an editing session. On failure the session keeps its changes
    /// so the operator can retry.
    pub async fn save(&self, editor: &mut PermissionEditor) -> Result<Role, AccessError> {
        let role = self
            .save_permissions(&editor.role_id, &editor.tree)
            .await?;
        editor.dirty = false;
        Ok(role)
    }

    /// Replaces a role's tree wholesale after reconciling it to canonical shape.
    #[instrument(name = "save_role_permissions", skip(self, permissions))]
    pub async fn save_permissions(
        &self,
        role_id: &str,
        permissions: &PermissionTree,
    ) -> Result<Role, AccessError> {
        let reconciled = PermissionTree::merge(canonical_tree(), permissions);
        match self.role_repo.update_permissions(role_id, &reconciled).await {
            Ok(role) => {
                info!(
                    role_id,
                    granted = role.permissions.granted_ids().len(),
                    "Role permissions saved"
                );
                Ok(role)
            }
            Err(RepositoryError::NotFound) => Err(AccessError::RoleNotFound(role_id.to_string())),
            Err(e) => {
                error!(role_id, error = %e, "Failed to save role permissions");
                Err(e.into())
            }
        }
    }

    /// Evaluation query against the role's persisted tree.
    pub async fn role_has_capability(
        &self,
        role_id: &str,
        capability_id: &str,
    ) -> Result<bool, AccessError> {
        Ok(self.load_role(role_id).await?.has_capability(capability_id))
    }

    /// Loads a user with the role they hold, if any.
    pub async fn user_context(&self, user_id: &str) -> Result<(User, Option<Role>), AccessError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AccessError::UserNotFound(user_id.to_string()))?;
        let role = match &user.role_id {
            Some(role_id) => {
                let role = self.role_repo.find_by_id(role_id).await?;
                if role.is_none() {
                    warn!(user_id, role_id = %role_id, "User references a missing role");
                }
                role
            }
            None => None,
        };
        Ok((user, role))
    }

    /// Evaluation query for a user. No role means nothing is granted.
    #[instrument(skip(self))]
    pub async fn user_has_capability(
        &self,
        user_id: &str,
        capability_id: &str,
    ) -> Result<bool, AccessError> {
        let (_, role) = self.user_context(user_id).await?;
        Ok(role.is_some_and(|r| r.has_capability(capability_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission_catalog::capability;
    use crate::infrastructure::{InMemoryRoleRepository, InMemoryUserRepository};

    fn service_with(roles: Vec<Role>, users: Vec<User>) -> AccessControlService {
        AccessControlService::new(
            Arc::new(InMemoryRoleRepository::with_roles(roles)),
            Arc::new(InMemoryUserRepository::new(users)),
        )
    }

    #[test]
    fn test_editor_surfaces_rejected_toggle() {
        let role = Role::new("PM", "brand1");
        let mut editor = PermissionEditor::open(&role);

        let result = editor.toggle(&[capability::FINANCE, capability::FINANCE_EXPORT]);
        assert!(matches!(
            result,
            Err(ToggleRejection::AncestorNotGranted { .. })
        ));
        assert!(!editor.is_dirty());
        assert!(!editor.tree().has_capability(capability::FINANCE_EXPORT));
    }

    #[test]
    fn test_editor_select_all_round_trip() {
        let role = Role::new("PM", "brand1");
        let mut editor = PermissionEditor::open(&role);

        editor.select_all();
        assert!(editor.is_fully_selected());
        editor.select_all();
        assert!(editor.tree().granted_ids().is_empty());
        assert!(editor.is_dirty());
    }

    #[tokio::test]
    async fn test_open_edit_save_flow() {
        let role = Role::new("Finance lead", "brand1");
        let role_id = role.id.clone();
        let service = service_with(vec![role], vec![]);

        let mut editor = service.open_editor(&role_id).await.unwrap();
        editor.toggle(&[capability::FINANCE]).unwrap();
        let saved = service.save(&mut editor).await.unwrap();

        assert!(!editor.is_dirty());
        assert!(saved.has_capability(capability::FINANCE_POLICY));
        assert!(
            service
                .role_has_capability(&role_id, capability::FINANCE_EXPORT)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_unknown_role() {
        let service = service_with(vec![], vec![]);
        let result = service
            .save_permissions("missing", &PermissionTree::default())
            .await;
        assert!(matches!(result, Err(AccessError::RoleNotFound(_))));
    }

    #[tokio::test]
    async fn test_user_without_role_has_no_capabilities() {
        let user = User {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            brand_id: "brand1".to_string(),
            role_id: None,
        };
        let service = service_with(vec![], vec![user]);

        assert!(
            !service
                .user_has_capability("u1", capability::DASHBOARD)
                .await
                .unwrap()
        );
        assert!(matches!(
            service.user_has_capability("nobody", capability::DASHBOARD).await,
            Err(AccessError::UserNotFound(_))
        ));
    }
}
