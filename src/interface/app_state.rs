use crate::application::{
    command_bus::CommandBus, query_bus::QueryBus, services::AccessControlService,
};
use crate::infrastructure::{RoleRepository, UserRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub role_repo: Arc<dyn RoleRepository + Send + Sync>,
    pub user_repo: Arc<dyn UserRepository + Send + Sync>,
    pub access_service: Arc<AccessControlService>,
    pub command_bus: Arc<CommandBus>,
    pub query_bus: Arc<QueryBus>,
}
