use super::queries::{
    CheckRoleCapabilityQuery, CheckUserCapabilityQuery, GetRoleByIdQuery,
    GetRolePermissionTreeQuery, ListRolesForBrandQuery, PermissionTreeReadModel, RoleReadModel,
};
use super::query_bus::QueryHandler;
use super::services::{AccessControlService, AccessError};
use crate::infrastructure::RoleRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

// ============================================================================
// QUERY HANDLERS
// ============================================================================

/// Get role by ID query handler
pub struct GetRoleByIdQueryHandler {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
}

impl GetRoleByIdQueryHandler {
    pub fn new(role_repo: Arc<dyn RoleRepository + Send + Sync>) -> Self {
        Self { role_repo }
    }
}

#[async_trait]
impl QueryHandler<GetRoleByIdQuery> for GetRoleByIdQueryHandler {
    type Result = Option<RoleReadModel>;
    type Error = AccessError;

    #[instrument(name = "get_role_by_id_query_handler", skip(self, query), fields(role_id = %query.role_id))]
    async fn handle(&self, query: GetRoleByIdQuery) -> Result<Self::Result, Self::Error> {
        let role = self.role_repo.find_by_id(&query.role_id).await?;
        Ok(role.map(RoleReadModel::from))
    }
}

/// List roles for brand query handler
pub struct ListRolesForBrandQueryHandler {
    role_repo: Arc<dyn RoleRepository + Send + Sync>,
}

impl ListRolesForBrandQueryHandler {
    pub fn new(role_repo: Arc<dyn RoleRepository + Send + Sync>) -> Self {
        Self { role_repo }
    }
}

#[async_trait]
impl QueryHandler<ListRolesForBrandQuery> for ListRolesForBrandQueryHandler {
    type Result = Vec<RoleReadModel>;
    type Error = AccessError;

    #[instrument(name = "list_roles_for_brand_query_handler", skip(self, query), fields(brand_id = %query.brand_id))]
    async fn handle(&self, query: ListRolesForBrandQuery) -> Result<Self::Result, Self::Error> {
        let roles = self.role_repo.list_for_brand(&query.brand_id).await?;
        Ok(roles.into_iter().map(RoleReadModel::from).collect())
    }
}

/// Get role permission tree query handler
pub struct GetRolePermissionTreeQueryHandler {
    access_service: Arc<AccessControlService>,
}

impl GetRolePermissionTreeQueryHandler {
    pub fn new(access_service: Arc<AccessControlService>) -> Self {
        Self { access_service }
    }
}

#[async_trait]
impl QueryHandler<GetRolePermissionTreeQuery> for GetRolePermissionTreeQueryHandler {
    type Result = PermissionTreeReadModel;
    type Error = AccessError;

    async fn handle(&self, query: GetRolePermissionTreeQuery) -> Result<Self::Result, Self::Error> {
        let editor = self.access_service.open_editor(&query.role_id).await?;
        Ok(PermissionTreeReadModel {
            role_id: editor.role_id().to_string(),
            brand_id: editor.brand_id().to_string(),
            fully_selected: editor.is_fully_selected(),
            permissions: editor.tree().clone(),
        })
    }
}

/// Check role capability query handler
pub struct CheckRoleCapabilityQueryHandler {
    access_service: Arc<AccessControlService>,
}

impl CheckRoleCapabilityQueryHandler {
    pub fn new(access_service: Arc<AccessControlService>) -> Self {
        Self { access_service }
    }
}

#[async_trait]
impl QueryHandler<CheckRoleCapabilityQuery> for CheckRoleCapabilityQueryHandler {
    type Result = bool;
    type Error = AccessError;

    #[instrument(
        name = "check_role_capability_query_handler",
        skip(self, query),
        fields(role_id = %query.role_id, capability_id = %query.capability_id)
    )]
    async fn handle(&self, query: CheckRoleCapabilityQuery) -> Result<Self::Result, Self::Error> {
        self.access_service
            .role_has_capability(&query.role_id, &query.capability_id)
            .await
    }
}

/// Check user capability query handler
pub struct CheckUserCapabilityQueryHandler {
    access_service: Arc<AccessControlService>,
}

impl CheckUserCapabilityQueryHandler {
    pub fn new(access_service: Arc<AccessControlService>) -> Self {
        Self { access_service }
    }
}

#[async_trait]
impl QueryHandler<CheckUserCapabilityQuery> for CheckUserCapabilityQueryHandler {
    type Result = bool;
    type Error = AccessError;

    async fn handle(&self, query: CheckUserCapabilityQuery) -> Result<Self::Result, Self::Error> {
        self.access_service
            .user_has_capability(&query.user_id, &query.capability_id)
            .await
    }
}
