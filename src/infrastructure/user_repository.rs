use super::{RepoResult, RepositoryError, UserRepository};
use crate::domain::user::User;
use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::instrument;

#[derive(Debug, FromRow)]
struct UserRow {
    pub id: String,
    pub email: String,
    pub brand_id: String,
    pub role_id: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            brand_id: row.brand_id,
            role_id: row.role_id,
        }
    }
}

pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, User>>, // key: user id
}

impl InMemoryUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: Mutex::new(users),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, user_id: &str) -> RepoResult<Option<User>> {
        let users = self.users.lock().map_err(|_| RepositoryError::Poisoned)?;
        Ok(users.get(user_id).cloned())
    }

    async fn set_role(&self, user_id: &str, role_id: Option<&str>) -> RepoResult<User> {
        let mut users = self.users.lock().map_err(|_| RepositoryError::Poisoned)?;
        let user = users.get_mut(user_id).ok_or(RepositoryError::NotFound)?;
        match role_id {
            Some(role_id) => user.assign_role(role_id.to_string()),
            None => user.clear_role(),
        }
        Ok(user.clone())
    }

    async fn clear_role_references(&self, role_id: &str) -> RepoResult<u64> {
        let mut users = self.users.lock().map_err(|_| RepositoryError::Poisoned)?;
        let mut cleared = 0;
        for user in users.values_mut() {
            if user.role_id.as_deref() == Some(role_id) {
                user.clear_role();
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, user_id: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, brand_id, role_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    #[instrument(skip(self))]
    async fn set_role(&self, user_id: &str, role_id: Option<&str>) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET role_id = $1 WHERE id = $2 RETURNING id, email, brand_id, role_id",
        )
        .bind(role_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::from).ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self))]
    async fn clear_role_references(&self, role_id: &str) -> RepoResult<u64> {
        let result = sqlx::query("UPDATE users SET role_id = NULL WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User {
                id: "u1".to_string(),
                email: "a@example.com".to_string(),
                brand_id: "brand1".to_string(),
                role_id: Some("r1".to_string()),
            },
            User {
                id: "u2".to_string(),
                email: "b@example.com".to_string(),
                brand_id: "brand1".to_string(),
                role_id: Some("r1".to_string()),
            },
            User {
                id: "u3".to_string(),
                email: "c@example.com".to_string(),
                brand_id: "brand1".to_string(),
                role_id: Some("r2".to_string()),
            },
        ]
    }

    #[tokio::test]
    async fn test_set_role_on_unknown_user() {
        let repo = InMemoryUserRepository::new(users());
        assert!(matches!(
            repo.set_role("missing", Some("r1")).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_clear_role_references_only_touches_holders() {
        let repo = InMemoryUserRepository::new(users());
        assert_eq!(repo.clear_role_references("r1").await.unwrap(), 2);

        let u1 = repo.find_by_id("u1").await.unwrap().unwrap();
        let u3 = repo.find_by_id("u3").await.unwrap().unwrap();
        assert!(u1.role_id.is_none());
        assert_eq!(u3.role_id.as_deref(), Some("r2"));
    }
}
