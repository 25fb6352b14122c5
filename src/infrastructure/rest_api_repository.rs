use crate::domain::permission::PermissionTree;
use crate::domain::role::Role;
use crate::domain::user::User;
use crate::infrastructure::{RepoResult, RepositoryError, RoleRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument};

/// Role record as exchanged with the dashboard REST API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteRole {
    id: String,
    name: String,
    brand_id: String,
    #[serde(default)]
    permissions: PermissionTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RemoteRole> for Role {
    fn from(remote: RemoteRole) -> Self {
        let now = Utc::now();
        let created_at = remote.created_at.unwrap_or(now);
        Role {
            id: remote.id,
            name: remote.name,
            brand_id: remote.brand_id,
            permissions: remote.permissions,
            created_at,
            updated_at: remote.updated_at.unwrap_or(created_at),
        }
    }
}

impl From<&Role> for RemoteRole {
    fn from(role: &Role) -> Self {
        RemoteRole {
            id: role.id.clone(),
            name: role.name.clone(),
            brand_id: role.brand_id.clone(),
            permissions: role.permissions.clone(),
            created_at: Some(role.created_at),
            updated_at: Some(role.updated_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteUser {
    id: String,
    email: String,
    brand_id: String,
    #[serde(default)]
    role_id: Option<String>,
}

impl From<RemoteUser> for User {
    fn from(remote: RemoteUser) -> Self {
        User {
            id: remote.id,
            email: remote.email,
            brand_id: remote.brand_id,
            role_id: remote.role_id,
        }
    }
}

/// Role and user storage backed by the existing dashboard REST API.
///
/// Every call is a single request/response; failures are returned to the
/// caller without retry.
pub struct RestApiRepository {
    http_client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl RestApiRepository {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> RepoResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| RepositoryError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RepositoryError::InvalidUrl(base_url.to_string()));
        }
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            api_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http_client.request(method, self.endpoint(segments));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Decodes a JSON body, mapping 404 to `None` and other failures to `Remote`.
    async fn read_optional<T: DeserializeOwned>(response: Response) -> RepoResult<Option<T>> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            error!(status = status.as_u16(), "Remote API request failed");
            return Err(RepositoryError::Remote {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn read<T: DeserializeOwned>(response: Response) -> RepoResult<T> {
        Self::read_optional(response)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl RoleRepository for RestApiRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, role_id: &str) -> RepoResult<Option<Role>> {
        let response = self.request(Method::GET, &["roles", role_id]).send().await?;
        let remote: Option<RemoteRole> = Self::read_optional(response).await?;
        Ok(remote.map(Role::from))
    }

    #[instrument(skip(self))]
    async fn list_for_brand(&self, brand_id: &str) -> RepoResult<Vec<Role>> {
        let response = self
            .request(Method::GET, &["roles"])
            .query(&[("brandId", brand_id)])
            .send()
            .await?;
        let remote: Vec<RemoteRole> = Self::read(response).await?;
        Ok(remote.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self, role), fields(role_id = %role.id))]
    async fn create(&self, role: Role) -> RepoResult<Role> {
        let response = self
            .request(Method::POST, &["roles"])
            .json(&RemoteRole::from(&role))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(RepositoryError::Conflict(format!(
                "role '{}' already exists in brand {}",
                role.name, role.brand_id
            )));
        }
        let remote: RemoteRole = Self::read(response).await?;
        Ok(remote.into())
    }

    #[instrument(skip(self, permissions))]
    async fn update_permissions(
        &self,
        role_id: &str,
        permissions: &PermissionTree,
    ) -> RepoResult<Role> {
        let response = self
            .request(Method::PUT, &["roles", role_id])
            .json(&serde_json::json!({ "permissions": permissions }))
            .send()
            .await?;
        let remote: RemoteRole = Self::read(response).await?;
        Ok(remote.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, role_id: &str) -> RepoResult<()> {
        let response = self
            .request(Method::DELETE, &["roles", role_id])
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(RepositoryError::NotFound),
            status if status.is_success() => Ok(()),
            status => Err(RepositoryError::Remote {
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl UserRepository for RestApiRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, user_id: &str) -> RepoResult<Option<User>> {
        let response = self.request(Method::GET, &["users", user_id]).send().await?;
        let remote: Option<RemoteUser> = Self::read_optional(response).await?;
        Ok(remote.map(User::from))
    }

    #[instrument(skip(self))]
    async fn set_role(&self, user_id: &str, role_id: Option<&str>) -> RepoResult<User> {
        let response = self
            .request(Method::PUT, &["users", user_id])
            .json(&serde_json::json!({ "roleId": role_id }))
            .send()
            .await?;
        let remote: RemoteUser = Self::read(response).await?;
        Ok(remote.into())
    }

    async fn clear_role_references(&self, _role_id: &str) -> RepoResult<u64> {
        // The remote API detaches users itself when a role is deleted.
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(base: &str) -> RestApiRepository {
        RestApiRepository::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let repo = repo("https://api.example.com/v2/");
        assert_eq!(
            repo.endpoint(&["roles", "abc"]).as_str(),
            "https://api.example.com/v2/roles/abc"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let repo = repo("https://api.example.com");
        assert_eq!(
            repo.endpoint(&["roles", "a/b"]).as_str(),
            "https://api.example.com/roles/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            RestApiRepository::new("not a url", None, Duration::from_secs(1)),
            Err(RepositoryError::InvalidUrl(_))
        ));
        assert!(matches!(
            RestApiRepository::new("mailto:admin@example.com", None, Duration::from_secs(1)),
            Err(RepositoryError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_remote_role_uses_camel_case() {
        let remote: RemoteRole = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "name": "PM",
            "brandId": "brand1",
            "permissions": [{ "id": "finance", "label": "Finance", "checked": true }]
        }))
        .unwrap();
        let role = Role::from(remote);
        assert_eq!(role.brand_id, "brand1");
        assert!(role.has_capability("finance"));
        assert_eq!(role.created_at, role.updated_at);
    }
}
