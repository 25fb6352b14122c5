use crate::domain::permission::{PermissionNode, PermissionTree};
use once_cell::sync::Lazy;

/// Bumped whenever nodes are added to the catalog. Existing ids are never renamed:
/// persisted roles reference them.
pub const CATALOG_VERSION: u32 = 3;

/// Capability ids referenced from code.
pub mod capability {
    pub const DASHBOARD: &str = "dashboard";
    pub const DASHBOARD_BRAND_ADD: &str = "dashboard-brand-add";
    pub const DASHBOARD_BRAND_VIEW_ADD_USER: &str = "dashboard-brand-view-adduser";
    pub const PROJECTS: &str = "projects";
    pub const PROJECTS_BUDGET_EXPORT: &str = "projects-budget-export";
    pub const PROJECTS_TASK_LIST_EDIT: &str = "projects-task-list-action-edit";
    pub const PROJECTS_DOCUMENTS_UPLOAD: &str = "projects-documents-upload";
    pub const FINANCE: &str = "finance";
    pub const FINANCE_EXPORT: &str = "finance-Export";
    pub const FINANCE_POLICY: &str = "finance-policy";
    pub const REPORTS: &str = "reports";
    pub const DOCUMENTS_UPLOAD: &str = "documents-upload";
    pub const SETTINGS: &str = "settings";
    pub const SETTINGS_USERS_ASSIGN_ROLE: &str = "settings-users-assign-role";
    pub const SETTINGS_ROLES: &str = "settings-roles";
    pub const SETTINGS_ROLES_ADD: &str = "settings-roles-add";
    pub const SETTINGS_ROLES_EDIT: &str = "settings-roles-edit";
    pub const SETTINGS_ROLES_DELETE: &str = "settings-roles-delete";
}

use PermissionNode as Node;

static CANONICAL_TREE: Lazy<PermissionTree> = Lazy::new(|| {
    PermissionTree(vec![
        Node::branch(
            "dashboard",
            "Dashboard",
            vec![
                Node::title(
                    "dashboard-brand",
                    "Brands",
                    vec![
                        Node::leaf("dashboard-brand-add", "Add brand"),
                        Node::leaf("dashboard-brand-edit", "Edit brand"),
                        Node::leaf("dashboard-brand-delete", "Delete brand"),
                        Node::branch(
                            "dashboard-brand-view",
                            "View brand",
                            vec![
                                Node::leaf("dashboard-brand-view-adduser", "Add user"),
                                Node::leaf("dashboard-brand-view-edituser", "Edit user"),
                                Node::leaf("dashboard-brand-view-removeuser", "Remove user"),
                            ],
                        ),
                    ],
                ),
                Node::leaf("dashboard-summary", "Portfolio summary"),
            ],
        ),
        Node::branch(
            "projects",
            "Projects",
            vec![
                Node::leaf("projects-add", "Add project"),
                Node::leaf("projects-edit", "Edit project"),
                Node::leaf("projects-delete", "Delete project"),
                Node::title(
                    "projects-detail",
                    "Project detail",
                    vec![
                        Node::leaf("projects-overview", "Overview"),
                        Node::branch(
                            "projects-budget",
                            "Budget",
                            vec![
                                Node::leaf("projects-budget-add", "Add budget line"),
                                Node::leaf("projects-budget-edit", "Edit budget line"),
                                Node::leaf("projects-budget-export", "Export budget"),
                                Node::leaf("projects-budget-import", "Import from Excel"),
                            ],
                        ),
                        Node::branch(
                            "projects-task-list",
                            "Tasks",
                            vec![
                                Node::leaf("projects-task-list-action-add", "Add task"),
                                Node::leaf("projects-task-list-action-edit", "Edit task"),
                                Node::leaf("projects-task-list-action-delete", "Delete task"),
                            ],
                        ),
                        Node::branch(
                            "projects-tender",
                            "Tenders",
                            vec![
                                Node::leaf("projects-tender-add", "Add tender"),
                                Node::leaf("projects-tender-award", "Award tender"),
                                Node::leaf("projects-tender-import", "Import tender"),
                            ],
                        ),
                        Node::branch(
                            "projects-documents",
                            "Documents",
                            vec![
                                Node::leaf("projects-documents-upload", "Upload"),
                                Node::leaf("projects-documents-delete", "Delete"),
                            ],
                        ),
                        Node::branch(
                            "projects-discussion",
                            "Discussion",
                            vec![
                                Node::leaf("projects-discussion-post", "Post message"),
                                Node::leaf("projects-discussion-delete", "Delete message"),
                            ],
                        ),
                    ],
                ),
            ],
        ),
        Node::branch(
            "finance",
            "Finance",
            vec![
                Node::leaf("finance-Export", "Export"),
                Node::leaf("finance-policy", "EAC policy"),
            ],
        ),
        Node::branch(
            "reports",
            "Reports",
            vec![
                Node::leaf("reports-view", "View reports"),
                Node::leaf("reports-export", "Export reports"),
            ],
        ),
        Node::branch(
            "documents",
            "Documents",
            vec![
                Node::leaf("documents-upload", "Upload"),
                Node::leaf("documents-download", "Download"),
                Node::leaf("documents-delete", "Delete"),
            ],
        ),
        Node::branch(
            "settings",
            "Settings",
            vec![
                Node::branch(
                    "settings-users",
                    "Users",
                    vec![
                        Node::leaf("settings-users-invite", "Invite user"),
                        Node::leaf("settings-users-assign-role", "Assign role"),
                    ],
                ),
                Node::branch(
                    "settings-roles",
                    "Roles & access control",
                    vec![
                        Node::leaf("settings-roles-add", "Add role"),
                        Node::leaf("settings-roles-edit", "Edit permissions"),
                        Node::leaf("settings-roles-delete", "Delete role"),
                    ],
                ),
            ],
        ),
    ])
});

/// The canonical catalog of every gateable capability, all unchecked.
pub fn canonical_tree() -> &'static PermissionTree {
    &CANONICAL_TREE
}

/// An owned copy of the canonical catalog, used to seed new roles.
pub fn blank_tree() -> PermissionTree {
    CANONICAL_TREE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_are_unique() {
        assert!(canonical_tree().duplicate_ids().is_empty());
    }

    #[test]
    fn test_catalog_is_unchecked() {
        assert!(canonical_tree().granted_ids().is_empty());
        assert!(!canonical_tree().has_capability(capability::DASHBOARD));
    }

    #[test]
    fn test_capability_constants_exist_in_catalog() {
        let ids = [
            capability::DASHBOARD,
            capability::DASHBOARD_BRAND_ADD,
            capability::DASHBOARD_BRAND_VIEW_ADD_USER,
            capability::PROJECTS,
            capability::PROJECTS_BUDGET_EXPORT,
            capability::PROJECTS_TASK_LIST_EDIT,
            capability::PROJECTS_DOCUMENTS_UPLOAD,
            capability::FINANCE,
            capability::FINANCE_EXPORT,
            capability::FINANCE_POLICY,
            capability::REPORTS,
            capability::DOCUMENTS_UPLOAD,
            capability::SETTINGS,
            capability::SETTINGS_USERS_ASSIGN_ROLE,
            capability::SETTINGS_ROLES,
            capability::SETTINGS_ROLES_ADD,
            capability::SETTINGS_ROLES_EDIT,
            capability::SETTINGS_ROLES_DELETE,
        ];
        for id in ids {
            let node = canonical_tree().find(id);
            assert!(node.is_some(), "missing capability {id}");
            assert!(!node.unwrap().is_title, "{id} is a title");
        }
    }

    #[test]
    fn test_blank_tree_matches_catalog() {
        assert_eq!(&blank_tree(), canonical_tree());
    }
}
