pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod test_utils;

use application::{
    command_bus::CommandBus,
    command_handlers::{
        AssignUserRoleCommandHandler, CreateRoleCommandHandler, DeleteRoleCommandHandler,
        UpdateRolePermissionsCommandHandler,
    },
    commands::{
        AssignUserRoleCommand, CreateRoleCommand, DeleteRoleCommand, UpdateRolePermissionsCommand,
    },
    queries::{
        CheckRoleCapabilityQuery, CheckUserCapabilityQuery, GetRoleByIdQuery,
        GetRolePermissionTreeQuery, ListRolesForBrandQuery,
    },
    query_bus::QueryBus,
    query_handlers::{
        CheckRoleCapabilityQueryHandler, CheckUserCapabilityQueryHandler,
        GetRoleByIdQueryHandler, GetRolePermissionTreeQueryHandler,
        ListRolesForBrandQueryHandler,
    },
    services::AccessControlService,
};
use domain::role::Role;
use domain::user::User;
use infrastructure::{
    InMemoryRoleRepository, InMemoryUserRepository, PostgresRoleRepository,
    PostgresUserRepository, RepositoryError, RestApiRepository, RoleRepository, UserRepository,
};
use interface::AppState;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type SharedRoleRepository = Arc<dyn RoleRepository + Send + Sync>;
pub type SharedUserRepository = Arc<dyn UserRepository + Send + Sync>;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Where roles and users are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
    Remote,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            "remote" => Ok(Self::Remote),
            other => Err(ConfigError::Invalid(format!(
                "STORAGE_BACKEND must be one of postgres, memory, remote (got '{other}')"
            ))),
        }
    }
}

/// Administrator seeded into the in-memory backend, which has no other way to gain users
#[derive(Debug, Clone, PartialEq)]
pub struct SeedAdmin {
    pub brand_id: String,
    pub user_id: String,
    pub email: String,
}

impl SeedAdmin {
    /// A full-access role for the seed brand and the user holding it
    pub fn records(&self) -> (Role, User) {
        let role = Role::with_full_access("Administrator", &self.brand_id);
        let user = User {
            id: self.user_id.clone(),
            email: self.email.clone(),
            brand_id: self.brand_id.clone(),
            role_id: Some(role.id.clone()),
        };
        (role, user)
    }
}

/// Application configuration with all environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub http_host: String,
    pub http_port: u16,
    pub storage_backend: StorageBackend,
    pub remote_api_url: Option<String>,
    pub remote_api_token: Option<String>,
    pub remote_timeout_secs: u64,
    pub seed_admin: Option<SeedAdmin>,
}

impl AppConfig {
    /// Creates a new AppConfig from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let database_url = var("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingRequired("DATABASE_URL".to_string()));
        }

        let remote_api_url = var("REMOTE_API_URL");
        if storage_backend == StorageBackend::Remote && remote_api_url.is_none() {
            return Err(ConfigError::MissingRequired("REMOTE_API_URL".to_string()));
        }

        let http_port = match var("HTTP_PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("HTTP_PORT is not a port: {value}")))?,
            None => DEFAULT_HTTP_PORT,
        };

        let remote_timeout_secs = match var("REMOTE_TIMEOUT_SECS") {
            Some(value) => value.parse().map_err(|_| {
                ConfigError::Invalid(format!("REMOTE_TIMEOUT_SECS is not a number: {value}"))
            })?,
            None => DEFAULT_REMOTE_TIMEOUT_SECS,
        };

        let seed_admin = match (var("SEED_BRAND_ID"), var("SEED_ADMIN_USER_ID")) {
            (Some(brand_id), Some(user_id)) => Some(SeedAdmin {
                email: var("SEED_ADMIN_EMAIL").unwrap_or_else(|| format!("{user_id}@localhost")),
                brand_id,
                user_id,
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingRequired("SEED_ADMIN_USER_ID".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingRequired("SEED_BRAND_ID".to_string()));
            }
            (None, None) => None,
        };
        if storage_backend == StorageBackend::Memory && seed_admin.is_none() {
            return Err(ConfigError::MissingRequired("SEED_ADMIN_USER_ID".to_string()));
        }

        Ok(AppConfig {
            database_url,
            http_host: var("HTTP_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port,
            storage_backend,
            remote_api_url,
            remote_api_token: var("REMOTE_API_TOKEN"),
            remote_timeout_secs,
            seed_admin,
        })
    }

    /// Creates an AppConfig with custom values (useful for testing)
    pub fn new(storage_backend: StorageBackend, http_host: String, http_port: u16) -> Self {
        Self {
            database_url: None,
            http_host,
            http_port,
            storage_backend,
            remote_api_url: None,
            remote_api_token: None,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            seed_admin: None,
        }
    }

    /// Creates the HTTP address string from host and port
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingRequired(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// APPLICATION BUILDER
// ============================================================================

/// Builder for creating application state with better testability
#[derive(Default)]
pub struct AppStateBuilder {
    pool: Option<PgPool>,
    config: Option<AppConfig>,
    role_repo: Option<SharedRoleRepository>,
    user_repo: Option<SharedUserRepository>,
}

impl AppStateBuilder {
    /// Creates a new AppStateBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database pool
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the configuration
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses the given repositories instead of the configured backend
    pub fn with_repositories(
        mut self,
        role_repo: SharedRoleRepository,
        user_repo: SharedUserRepository,
    ) -> Self {
        self.role_repo = Some(role_repo);
        self.user_repo = Some(user_repo);
        self
    }

    /// Builds the application state
    pub async fn build(self) -> Result<Arc<AppState>, AppError> {
        let (role_repo, user_repo) = match (self.role_repo, self.user_repo) {
            (Some(role_repo), Some(user_repo)) => (role_repo, user_repo),
            _ => Self::backend_repositories(self.pool, self.config.as_ref())?,
        };

        // Create services
        let access_service = Arc::new(AccessControlService::new(
            role_repo.clone(),
            user_repo.clone(),
        ));

        // Create CQRS buses
        let command_bus = Arc::new(CommandBus::new());
        let query_bus = Arc::new(QueryBus::new());

        Self::register_command_handlers(&command_bus, &role_repo, &user_repo, &access_service)
            .await;
        Self::register_query_handlers(&query_bus, &role_repo, &access_service).await;

        Ok(Arc::new(AppState {
            role_repo,
            user_repo,
            access_service,
            command_bus,
            query_bus,
        }))
    }

    fn backend_repositories(
        pool: Option<PgPool>,
        config: Option<&AppConfig>,
    ) -> Result<(SharedRoleRepository, SharedUserRepository), AppError> {
        let backend = config
            .map(|c| c.storage_backend)
            .unwrap_or(StorageBackend::Postgres);
        info!(?backend, "Configuring storage backend");

        let (role_repo, user_repo): (SharedRoleRepository, SharedUserRepository) = match backend
        {
            StorageBackend::Postgres => {
                let pool = pool.ok_or(AppError::MissingPool)?;
                let role_repo: SharedRoleRepository =
                    Arc::new(PostgresRoleRepository::new(pool.clone()));
                let user_repo: SharedUserRepository = Arc::new(PostgresUserRepository::new(pool));
                (role_repo, user_repo)
            }
            StorageBackend::Memory => {
                let seed = config.and_then(|c| c.seed_admin.as_ref()).ok_or_else(|| {
                    AppError::Config(ConfigError::MissingRequired(
                        "SEED_ADMIN_USER_ID".to_string(),
                    ))
                })?;
                let (admin_role, admin) = seed.records();
                info!(
                    brand_id = %seed.brand_id,
                    user_id = %seed.user_id,
                    "Seeding in-memory administrator"
                );
                let role_repo: SharedRoleRepository =
                    Arc::new(InMemoryRoleRepository::with_roles(vec![admin_role]));
                let user_repo: SharedUserRepository =
                    Arc::new(InMemoryUserRepository::new(vec![admin]));
                (role_repo, user_repo)
            }
            StorageBackend::Remote => {
                let config = config.ok_or_else(|| {
                    AppError::Config(ConfigError::MissingRequired("REMOTE_API_URL".to_string()))
                })?;
                let base_url = config.remote_api_url.as_deref().ok_or_else(|| {
                    AppError::Config(ConfigError::MissingRequired("REMOTE_API_URL".to_string()))
                })?;
                let remote = Arc::new(RestApiRepository::new(
                    base_url,
                    config.remote_api_token.clone(),
                    config.remote_timeout(),
                )?);
                let role_repo: SharedRoleRepository = remote.clone();
                let user_repo: SharedUserRepository = remote;
                (role_repo, user_repo)
            }
        };
        Ok((role_repo, user_repo))
    }

    /// Registers all command handlers
    async fn register_command_handlers(
        command_bus: &Arc<CommandBus>,
        role_repo: &SharedRoleRepository,
        user_repo: &SharedUserRepository,
        access_service: &Arc<AccessControlService>,
    ) {
        command_bus
            .register_handler::<CreateRoleCommand, _>(CreateRoleCommandHandler::new(
                role_repo.clone(),
            ))
            .await;

        command_bus
            .register_handler::<UpdateRolePermissionsCommand, _>(
                UpdateRolePermissionsCommandHandler::new(access_service.clone()),
            )
            .await;

        command_bus
            .register_handler::<DeleteRoleCommand, _>(DeleteRoleCommandHandler::new(
                role_repo.clone(),
                user_repo.clone(),
            ))
            .await;

        command_bus
            .register_handler::<AssignUserRoleCommand, _>(AssignUserRoleCommandHandler::new(
                role_repo.clone(),
                user_repo.clone(),
            ))
            .await;
    }

    /// Registers all query handlers
    async fn register_query_handlers(
        query_bus: &Arc<QueryBus>,
        role_repo: &SharedRoleRepository,
        access_service: &Arc<AccessControlService>,
    ) {
        query_bus
            .register_handler::<GetRoleByIdQuery, _>(GetRoleByIdQueryHandler::new(
                role_repo.clone(),
            ))
            .await;

        query_bus
            .register_handler::<ListRolesForBrandQuery, _>(ListRolesForBrandQueryHandler::new(
                role_repo.clone(),
            ))
            .await;

        query_bus
            .register_handler::<GetRolePermissionTreeQuery, _>(
                GetRolePermissionTreeQueryHandler::new(access_service.clone()),
            )
            .await;

        query_bus
            .register_handler::<CheckRoleCapabilityQuery, _>(
                CheckRoleCapabilityQueryHandler::new(access_service.clone()),
            )
            .await;

        query_bus
            .register_handler::<CheckUserCapabilityQuery, _>(
                CheckUserCapabilityQueryHandler::new(access_service.clone()),
            )
            .await;
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing database pool")]
    MissingPool,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Initialization error: {0}")]
    Initialization(String),
}
