use crate::interface::app_state::AppState;
use crate::interface::http_handlers::{
    USER_ID_HEADER, assign_user_role_handler, check_role_capability_handler,
    check_user_capability_handler, create_role_handler, delete_role_handler,
    get_permission_tree_handler, get_role_handler, get_role_permissions_handler,
    list_roles_handler, save_role_permissions_handler, select_all_handler,
    toggle_permission_handler,
};
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        crate::interface::http_handlers::get_permission_tree_handler,
        crate::interface::http_handlers::toggle_permission_handler,
        crate::interface::http_handlers::select_all_handler,
        crate::interface::http_handlers::list_roles_handler,
        crate::interface::http_handlers::create_role_handler,
        crate::interface::http_handlers::get_role_handler,
        crate::interface::http_handlers::delete_role_handler,
        crate::interface::http_handlers::get_role_permissions_handler,
        crate::interface::http_handlers::save_role_permissions_handler,
        crate::interface::http_handlers::check_role_capability_handler,
        crate::interface::http_handlers::check_user_capability_handler,
        crate::interface::http_handlers::assign_user_role_handler,
    ),
    components(schemas(
        crate::domain::permission::PermissionNode,
        crate::domain::permission::PermissionTree,
        crate::interface::CreateRoleRequest,
        crate::interface::RoleResponse,
        crate::interface::RolesListResponse,
        crate::interface::PermissionTreeResponse,
        crate::interface::SavePermissionsRequest,
        crate::interface::ToggleRequest,
        crate::interface::ToggleResponse,
        crate::interface::ToggleRejectedResponse,
        crate::interface::SelectAllRequest,
        crate::interface::SelectAllResponse,
        crate::interface::CapabilityResponse,
        crate::interface::AssignRoleRequest,
        crate::interface::UserResponse,
        crate::interface::ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Permission tree", description = "Canonical catalog and working-tree edits"),
        (name = "Roles", description = "Brand-scoped roles and their saved trees"),
        (name = "Evaluation", description = "Capability checks"),
        (name = "Users", description = "Role assignment"),
    )
)]
pub struct ApiDoc;

/// Registers the `x-user-id` header scheme.
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "userId",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
        );
    }
}

/// Versioned API routes plus Swagger UI.
pub fn build_router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/permission-tree", get(get_permission_tree_handler))
        .route("/permission-tree/toggle", post(toggle_permission_handler))
        .route("/permission-tree/select-all", post(select_all_handler))
        .route(
            "/brands/{brand_id}/roles",
            get(list_roles_handler).post(create_role_handler),
        )
        .route(
            "/roles/{role_id}",
            get(get_role_handler).delete(delete_role_handler),
        )
        .route(
            "/roles/{role_id}/permissions",
            get(get_role_permissions_handler).put(save_role_permissions_handler),
        )
        .route(
            "/roles/{role_id}/capabilities/{capability_id}",
            get(check_role_capability_handler),
        )
        .route(
            "/users/{user_id}/capabilities/{capability_id}",
            get(check_user_capability_handler),
        )
        .route("/users/{user_id}/role", put(assign_user_role_handler));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/swagger").url("/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
