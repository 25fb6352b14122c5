use crate::AppStateBuilder;
use crate::domain::permission_catalog::blank_tree;
use crate::domain::role::Role;
use crate::domain::user::User;
use crate::infrastructure::{InMemoryRoleRepository, InMemoryUserRepository};
use crate::interface::app_state::AppState;
use std::sync::Arc;

pub const BRAND_ID: &str = "brand1";
pub const OTHER_BRAND_ID: &str = "brand2";

pub const ADMIN_USER_ID: &str = "admin";
pub const VIEWER_USER_ID: &str = "viewer";
pub const UNASSIGNED_USER_ID: &str = "unassigned";
pub const OUTSIDER_USER_ID: &str = "outsider";

/// Creates a role granting every node of the catalog
pub fn create_full_access_role(name: &str, brand_id: &str) -> Role {
    Role::with_full_access(name, brand_id)
}

/// Creates a role with the given paths toggled on, in order
pub fn create_role_with_paths(name: &str, brand_id: &str, paths: &[&[&str]]) -> Role {
    let mut tree = blank_tree();
    for path in paths {
        tree = tree.toggled(*path).expect("seed path must be grantable");
    }
    let mut role = Role::new(name, brand_id);
    role.replace_permissions(tree);
    role
}

/// Creates a test user
pub fn create_test_user(id: &str, brand_id: &str, role_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        brand_id: brand_id.to_string(),
        role_id: role_id.map(str::to_string),
    }
}

/// In-memory application state with two brands and a handful of users
pub struct TestFixture {
    pub state: Arc<AppState>,
    pub role_repo: Arc<InMemoryRoleRepository>,
    pub user_repo: Arc<InMemoryUserRepository>,
    pub admin_role: Role,
    pub viewer_role: Role,
    pub other_brand_role: Role,
}

/// Seeds:
/// - `admin` (brand1) holding a full-access role
/// - `viewer` (brand1) holding a role with the dashboard subtree plus
///   read-only `settings-roles`
/// - `unassigned` (brand1) holding no role
/// - `outsider` (brand2) holding a full-access role of brand2
pub async fn create_test_fixture() -> TestFixture {
    let admin_role = create_full_access_role("Administrator", BRAND_ID);
    let viewer_role = create_role_with_paths(
        "Viewer",
        BRAND_ID,
        &[
            &["dashboard"],
            &["settings"],
            &["settings", "settings-users"],
            &["settings", "settings-roles", "settings-roles-add"],
            &["settings", "settings-roles", "settings-roles-edit"],
            &["settings", "settings-roles", "settings-roles-delete"],
        ],
    );
    let other_brand_role = create_full_access_role("Administrator", OTHER_BRAND_ID);

    let role_repo = Arc::new(InMemoryRoleRepository::with_roles(vec![
        admin_role.clone(),
        viewer_role.clone(),
        other_brand_role.clone(),
    ]));
    let user_repo = Arc::new(InMemoryUserRepository::new(vec![
        create_test_user(ADMIN_USER_ID, BRAND_ID, Some(admin_role.id.as_str())),
        create_test_user(VIEWER_USER_ID, BRAND_ID, Some(viewer_role.id.as_str())),
        create_test_user(UNASSIGNED_USER_ID, BRAND_ID, None),
        create_test_user(OUTSIDER_USER_ID, OTHER_BRAND_ID, Some(other_brand_role.id.as_str())),
    ]));

    let state = AppStateBuilder::new()
        .with_repositories(role_repo.clone(), user_repo.clone())
        .build()
        .await
        .expect("in-memory state builds");

    TestFixture {
        state,
        role_repo,
        user_repo,
        admin_role,
        viewer_role,
        other_brand_role,
    }
}

/// Creates a test application state with in-memory repositories
pub async fn create_test_app_state() -> Arc<AppState> {
    create_test_fixture().await.state
}
