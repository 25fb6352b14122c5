use crate::application::command_bus::BusError;
use crate::application::commands::CommandFactory;
use crate::application::queries::{PermissionTreeReadModel, QueryFactory, RoleReadModel};
use crate::application::services::{AccessError, select_all_working_tree, toggle_working_tree};
use crate::domain::permission::{PermissionTree, ToggleRejection};
use crate::domain::permission_catalog::{CATALOG_VERSION, canonical_tree, capability};
use crate::domain::role::Role;
use crate::domain::user::User;
use crate::infrastructure::RepositoryError;
use crate::interface::app_state::AppState;
use crate::interface::{
    AssignRoleRequest, CapabilityResponse, CreateRoleRequest, ErrorResponse,
    PermissionTreeResponse, RoleResponse, RolesListResponse, SavePermissionsRequest,
    SelectAllRequest, SelectAllResponse, ToggleRejectedResponse, ToggleRequest, ToggleResponse,
    UserResponse,
};
use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{error, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CATALOG_VERSION_HEADER: &str = "x-catalog-version";

/// Error returned by every handler as `ErrorResponse` JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let message = err.to_string();
        match err {
            AccessError::RoleNotFound(_) | AccessError::UserNotFound(_) => {
                Self::not_found(message)
            }
            AccessError::BrandMismatch { .. } => Self::forbidden(message),
            AccessError::Validation(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, message),
            AccessError::Repository(RepositoryError::NotFound) => Self::not_found(message),
            AccessError::Repository(RepositoryError::Conflict(_)) => {
                Self::new(StatusCode::CONFLICT, message)
            }
            AccessError::Repository(e) => {
                error!(error = %e, "Persistence failure");
                Self::new(StatusCode::BAD_GATEWAY, message)
            }
        }
    }
}

impl From<BusError> for ApiError {
    fn from(err: BusError) -> Self {
        match err.downcast::<AccessError>() {
            Ok(access) => (*access).into(),
            Err(other) => {
                error!(error = %other, "Bus dispatch failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// Caller identity for one request: the user named by `x-user-id` and the
/// role they hold, if any.
pub struct AccessContext {
    pub user: User,
    pub role: Option<Role>,
}

impl AccessContext {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn has(&self, capability_id: &str) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| role.has_capability(capability_id))
    }

    pub fn require(&self, capability_id: &str) -> Result<(), ApiError> {
        if self.has(capability_id) {
            return Ok(());
        }
        warn!(user_id = %self.user.id, capability_id, "Capability denied");
        Err(ApiError::forbidden(format!("Missing capability: {capability_id}")))
    }

    pub fn require_brand(&self, brand_id: &str) -> Result<(), ApiError> {
        if self.user.belongs_to(brand_id) {
            return Ok(());
        }
        warn!(user_id = %self.user.id, brand_id, "Cross-brand access denied");
        Err(ApiError::forbidden("Resource belongs to another brand"))
    }
}

impl<S> FromRequestParts<S> for AccessContext
where
    S: Deref<Target = AppState> + Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state: &AppState = state.deref();
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::unauthorized("Missing x-user-id header"))?;

        match app_state.access_service.user_context(&user_id).await {
            Ok((user, role)) => Ok(AccessContext { user, role }),
            Err(AccessError::UserNotFound(_)) => Err(ApiError::unauthorized("Unknown user")),
            Err(e) => Err(e.into()),
        }
    }
}

/// Loads a role and checks it belongs to the caller's brand.
async fn role_in_scope(
    state: &AppState,
    ctx: &AccessContext,
    role_id: String,
) -> Result<RoleReadModel, ApiError> {
    let role = state
        .query_bus
        .execute_as::<_, Option<RoleReadModel>>(QueryFactory::get_role_by_id(role_id.clone()))
        .await?
        .ok_or_else(|| ApiError::from(AccessError::RoleNotFound(role_id)))?;
    ctx.require_brand(&role.brand_id)?;
    Ok(role)
}

fn rejection_reason(rejection: &ToggleRejection) -> &'static str {
    match rejection {
        ToggleRejection::EmptyPath => "empty_path",
        ToggleRejection::UnknownPath { .. } => "unknown_path",
        ToggleRejection::TitleNode { .. } => "title_node",
        ToggleRejection::AncestorNotGranted { .. } => "ancestor_not_granted",
    }
}

// --- PERMISSION TREE HANDLERS ---

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/permission-tree",
    responses(
        (status = 200, description = "Canonical permission catalog, all unchecked", body = PermissionTree,
            headers(("x-catalog-version" = u32, description = "Catalog revision"))),
    ),
    tags = ["Permission tree"],
    description = "Return the canonical tree definition every role is reconciled against."
)]
pub async fn get_permission_tree_handler() -> impl IntoResponse {
    (
        [(CATALOG_VERSION_HEADER, CATALOG_VERSION.to_string())],
        Json(canonical_tree().clone()),
    )
}

#[axum::debug_handler(state = Arc<AppState>)]
#[utoipa::path(
    post,
    path = "/v1/permission-tree/toggle",
    request_body = ToggleRequest,
    responses(
        (status = 200, description = "Toggle applied", body = ToggleResponse),
        (status = 401, description = "Unknown caller", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 409, description = "Toggle rejected, tree unchanged", body = ToggleRejectedResponse),
    ),
    security(("userId" = [])),
    tags = ["Permission tree"],
    description = "Toggle one node of a working tree. Requires settings-roles-edit."
)]
pub async fn toggle_permission_handler(
    ctx: AccessContext,
    Json(payload): Json<ToggleRequest>,
) -> Result<Response, ApiError> {
    ctx.require(capability::SETTINGS_ROLES_EDIT)?;

    match toggle_working_tree(&payload.permissions, &payload.path) {
        Ok(permissions) => Ok(Json(ToggleResponse {
            fully_selected: permissions.is_fully_selected(),
            permissions,
        })
        .into_response()),
        Err(rejection) => Ok((
            StatusCode::CONFLICT,
            Json(ToggleRejectedResponse {
                error: rejection.to_string(),
                reason: rejection_reason(&rejection).to_string(),
            }),
        )
            .into_response()),
    }
}

#[axum::debug_handler(state = Arc<AppState>)]
#[utoipa::path(
    post,
    path = "/v1/permission-tree/select-all",
    request_body = SelectAllRequest,
    responses(
        (status = 200, description = "Every node set, or every node cleared", body = SelectAllResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Permission tree"],
    description = "Select-all toggle on a working tree. Requires settings-roles-edit."
)]
pub async fn select_all_handler(
    ctx: AccessContext,
    Json(payload): Json<SelectAllRequest>,
) -> Result<Json<SelectAllResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES_EDIT)?;

    let permissions = select_all_working_tree(&payload.permissions);
    Ok(Json(SelectAllResponse {
        fully_selected: permissions.is_fully_selected(),
        permissions,
    }))
}

// --- ROLE HANDLERS ---

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/brands/{brand_id}/roles",
    params(("brand_id" = String, Path, description = "Brand identifier")),
    responses(
        (status = 200, description = "Roles of the brand, by name", body = RolesListResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "List the roles of a brand. Requires settings-roles."
)]
pub async fn list_roles_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(brand_id): Path<String>,
) -> Result<Json<RolesListResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES)?;
    ctx.require_brand(&brand_id)?;

    let roles = state
        .query_bus
        .execute_as::<_, Vec<RoleReadModel>>(QueryFactory::list_roles_for_brand(brand_id))
        .await?;
    Ok(Json(RolesListResponse {
        roles: roles.into_iter().map(RoleResponse::from).collect(),
    }))
}

#[axum::debug_handler]
#[utoipa::path(
    post,
    path = "/v1/brands/{brand_id}/roles",
    params(("brand_id" = String, Path, description = "Brand identifier")),
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created with an all-unchecked tree", body = RoleResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 422, description = "Invalid or duplicate name", body = ErrorResponse),
        (status = 502, description = "Persistence failure, nothing created", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "Create a role in a brand. Requires settings-roles-add."
)]
pub async fn create_role_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(brand_id): Path<String>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    ctx.require(capability::SETTINGS_ROLES_ADD)?;
    ctx.require_brand(&brand_id)?;

    let cmd = CommandFactory::create_role(payload.name, brand_id, Some(ctx.user_id().to_string()));
    let role = state.command_bus.execute_as::<_, Role>(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(RoleResponse::from(RoleReadModel::from(role))),
    ))
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/roles/{role_id}",
    params(("role_id" = String, Path, description = "Role identifier")),
    responses(
        (status = 200, description = "Role with its persisted permissions", body = RoleResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "Get a role. Requires settings-roles."
)]
pub async fn get_role_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(role_id): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES)?;
    let role = role_in_scope(&state, &ctx, role_id).await?;
    Ok(Json(role.into()))
}

#[axum::debug_handler]
#[utoipa::path(
    delete,
    path = "/v1/roles/{role_id}",
    params(("role_id" = String, Path, description = "Role identifier")),
    responses(
        (status = 204, description = "Role deleted and detached from its users"),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "Delete a role with its whole permission tree. Requires settings-roles-delete."
)]
pub async fn delete_role_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(role_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.require(capability::SETTINGS_ROLES_DELETE)?;
    let role = role_in_scope(&state, &ctx, role_id).await?;

    state
        .command_bus
        .execute_as::<_, ()>(CommandFactory::delete_role(role.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/roles/{role_id}/permissions",
    params(("role_id" = String, Path, description = "Role identifier")),
    responses(
        (status = 200, description = "Saved grants merged into the canonical tree", body = PermissionTreeResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "Open a role's permission tree for editing. Requires settings-roles."
)]
pub async fn get_role_permissions_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(role_id): Path<String>,
) -> Result<Json<PermissionTreeResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES)?;

    let model = state
        .query_bus
        .execute_as::<_, PermissionTreeReadModel>(QueryFactory::get_role_permission_tree(role_id))
        .await?;
    ctx.require_brand(&model.brand_id)?;
    Ok(Json(model.into()))
}

#[axum::debug_handler]
#[utoipa::path(
    put,
    path = "/v1/roles/{role_id}/permissions",
    params(("role_id" = String, Path, description = "Role identifier")),
    request_body = SavePermissionsRequest,
    responses(
        (status = 200, description = "Tree replaced wholesale", body = RoleResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
        (status = 422, description = "Tree contains duplicate ids", body = ErrorResponse),
        (status = 502, description = "Persistence failure, nothing saved", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Roles"],
    description = "Save a role's permission tree. Requires settings-roles-edit."
)]
pub async fn save_role_permissions_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(role_id): Path<String>,
    Json(payload): Json<SavePermissionsRequest>,
) -> Result<Json<RoleResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES_EDIT)?;
    let role = role_in_scope(&state, &ctx, role_id).await?;

    let cmd = CommandFactory::update_role_permissions(
        role.id,
        payload.permissions,
        Some(ctx.user_id().to_string()),
    );
    let saved = state.command_bus.execute_as::<_, Role>(cmd).await?;
    Ok(Json(RoleReadModel::from(saved).into()))
}

// --- EVALUATION HANDLERS ---

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/roles/{role_id}/capabilities/{capability_id}",
    params(
        ("role_id" = String, Path, description = "Role identifier"),
        ("capability_id" = String, Path, description = "Permission node id"),
    ),
    responses(
        (status = 200, description = "Whether the role grants the capability", body = CapabilityResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Evaluation"],
    description = "Evaluate a capability against a role's saved tree. Requires settings-roles."
)]
pub async fn check_role_capability_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path((role_id, capability_id)): Path<(String, String)>,
) -> Result<Json<CapabilityResponse>, ApiError> {
    ctx.require(capability::SETTINGS_ROLES)?;
    let role = role_in_scope(&state, &ctx, role_id).await?;

    let granted = state
        .query_bus
        .execute_as::<_, bool>(QueryFactory::check_role_capability(
            role.id,
            capability_id.clone(),
        ))
        .await?;
    Ok(Json(CapabilityResponse {
        capability_id,
        granted,
    }))
}

#[axum::debug_handler]
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/capabilities/{capability_id}",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("capability_id" = String, Path, description = "Permission node id"),
    ),
    responses(
        (status = 200, description = "Whether the user's role grants the capability", body = CapabilityResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Evaluation"],
    description = "Evaluate a capability for a user. Callers may always check themselves; checking another user of the brand requires settings-roles."
)]
pub async fn check_user_capability_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path((user_id, capability_id)): Path<(String, String)>,
) -> Result<Json<CapabilityResponse>, ApiError> {
    if user_id == ctx.user_id() {
        return Ok(Json(CapabilityResponse {
            granted: ctx.has(&capability_id),
            capability_id,
        }));
    }

    ctx.require(capability::SETTINGS_ROLES)?;
    let (target, _) = state.access_service.user_context(&user_id).await?;
    ctx.require_brand(&target.brand_id)?;

    let granted = state
        .query_bus
        .execute_as::<_, bool>(QueryFactory::check_user_capability(
            target.id,
            capability_id.clone(),
        ))
        .await?;
    Ok(Json(CapabilityResponse {
        capability_id,
        granted,
    }))
}

// --- USER HANDLERS ---

#[axum::debug_handler]
#[utoipa::path(
    put,
    path = "/v1/users/{user_id}/role",
    params(("user_id" = String, Path, description = "User identifier")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assignment updated", body = UserResponse),
        (status = 403, description = "Insufficient permissions or role from another brand", body = ErrorResponse),
        (status = 404, description = "User or role not found", body = ErrorResponse),
    ),
    security(("userId" = [])),
    tags = ["Users"],
    description = "Assign a role to a user, or detach it with null. Requires settings-users-assign-role."
)]
pub async fn assign_user_role_handler(
    State(state): State<Arc<AppState>>,
    ctx: AccessContext,
    Path(user_id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    ctx.require(capability::SETTINGS_USERS_ASSIGN_ROLE)?;
    let (target, _) = state.access_service.user_context(&user_id).await?;
    ctx.require_brand(&target.brand_id)?;

    let cmd = CommandFactory::assign_user_role(
        target.id,
        payload.role_id,
        Some(ctx.user_id().to_string()),
    );
    let user = state.command_bus.execute_as::<_, User>(cmd).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::validators::ValidationError;

    #[test]
    fn test_access_error_status_mapping() {
        let cases = [
            (AccessError::RoleNotFound("r".into()), StatusCode::NOT_FOUND),
            (AccessError::UserNotFound("u".into()), StatusCode::NOT_FOUND),
            (
                AccessError::BrandMismatch {
                    role_id: "r".into(),
                    brand_id: "b".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AccessError::Validation(ValidationError::BusinessRule {
                    message: "taken".into(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AccessError::Repository(RepositoryError::Remote { status: 500 }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AccessError::Repository(RepositoryError::Conflict("idx".into())),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_unknown_bus_error_is_internal() {
        let err: BusError = "No handler registered".into();
        assert_eq!(
            ApiError::from(err).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rejection_reason_codes() {
        assert_eq!(rejection_reason(&ToggleRejection::EmptyPath), "empty_path");
        assert_eq!(
            rejection_reason(&ToggleRejection::AncestorNotGranted {
                id: "finance-Export".into(),
                ancestor_id: "finance".into(),
            }),
            "ancestor_not_granted"
        );
    }
}
