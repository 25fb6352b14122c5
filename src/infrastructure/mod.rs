use crate::domain::permission::PermissionTree;
use crate::domain::role::Role;
use crate::domain::user::User;
use async_trait::async_trait;

// Infrastructure layer: database, remote API, adapters
pub mod rest_api_repository;
pub mod role_repository;
pub mod user_repository;

pub use rest_api_repository::RestApiRepository;
pub use role_repository::{InMemoryRoleRepository, PostgresRoleRepository};
pub use user_repository::{InMemoryUserRepository, PostgresUserRepository};

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors raised by any backing store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("remote API responded with status {status}")]
    Remote { status: u16 },
    #[error("invalid remote API url: {0}")]
    InvalidUrl(String),
    #[error("in-memory store lock poisoned")]
    Poisoned,
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, role_id: &str) -> RepoResult<Option<Role>>;
    async fn list_for_brand(&self, brand_id: &str) -> RepoResult<Vec<Role>>;
    async fn create(&self, role: Role) -> RepoResult<Role>;
    /// Replaces the stored tree wholesale. Last write wins.
    async fn update_permissions(&self, role_id: &str, permissions: &PermissionTree)
    -> RepoResult<Role>;
    async fn delete(&self, role_id: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> RepoResult<Option<User>>;
    async fn set_role(&self, user_id: &str, role_id: Option<&str>) -> RepoResult<User>;
    /// Detaches a deleted role from every user holding it. Returns the number of users touched.
    async fn clear_role_references(&self, role_id: &str) -> RepoResult<u64>;
}
