use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use fitout_access_service::domain::permission_catalog::{blank_tree, capability};
use fitout_access_service::domain::role::Role;
use fitout_access_service::domain::user::User;
use fitout_access_service::infrastructure::{
    InMemoryRoleRepository, InMemoryUserRepository, PostgresRoleRepository,
    PostgresUserRepository, RepositoryError, RestApiRepository, RoleRepository, UserRepository,
};
use serde_json::{Value, json};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

// ============================================================================
// IN-MEMORY REPOSITORIES
// ============================================================================

#[tokio::test]
async fn test_in_memory_role_repository_lifecycle() {
    let repo = InMemoryRoleRepository::new();
    let role = repo.create(Role::new("Estimator", "brand1")).await.unwrap();
    repo.create(Role::new("Other brand", "brand2")).await.unwrap();

    let granted = blank_tree().toggled(&[capability::REPORTS]).unwrap();
    let updated = repo.update_permissions(&role.id, &granted).await.unwrap();
    assert!(updated.has_capability("reports-export"));
    assert!(updated.updated_at >= role.updated_at);

    let listed = repo.list_for_brand("brand1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].permissions, granted);

    repo.delete(&role.id).await.unwrap();
    assert!(repo.find_by_id(&role.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(&role.id).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(matches!(
        repo.update_permissions(&role.id, &granted).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_in_memory_user_repository_role_assignment() {
    let repo = InMemoryUserRepository::new(vec![User {
        id: "u1".to_string(),
        email: "u1@example.com".to_string(),
        brand_id: "brand1".to_string(),
        role_id: None,
    }]);

    let user = repo.set_role("u1", Some("r1")).await.unwrap();
    assert_eq!(user.role_id.as_deref(), Some("r1"));
    assert_eq!(repo.clear_role_references("r1").await.unwrap(), 1);
    assert!(repo.find_by_id("u1").await.unwrap().unwrap().role_id.is_none());
    assert!(matches!(
        repo.set_role("nobody", None).await,
        Err(RepositoryError::NotFound)
    ));
}

// ============================================================================
// REST API REPOSITORY AGAINST A LOCAL STAND-IN
// ============================================================================

#[derive(Default)]
struct RemoteStore {
    roles: HashMap<String, Value>,
    users: HashMap<String, Value>,
    last_auth: Option<String>,
}

type Store = Arc<Mutex<RemoteStore>>;

fn record_auth(store: &Store, headers: &HeaderMap) {
    store.lock().unwrap().last_auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

async fn get_role(
    State(store): State<Store>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    record_auth(&store, &headers);
    let store = store.lock().unwrap();
    store.roles.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn put_role(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = store.lock().unwrap();
    let role = store.roles.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    role["permissions"] = patch["permissions"].clone();
    Ok(Json(role.clone()))
}

async fn delete_role(State(store): State<Store>, Path(id): Path<String>) -> StatusCode {
    match store.lock().unwrap().roles.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_roles(
    State(store): State<Store>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let brand_id = params.get("brandId").cloned().unwrap_or_default();
    let store = store.lock().unwrap();
    Json(
        store
            .roles
            .values()
            .filter(|r| r["brandId"] == brand_id.as_str())
            .cloned()
            .collect(),
    )
}

async fn create_role(
    State(store): State<Store>,
    Json(role): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut store = store.lock().unwrap();
    let duplicate = store
        .roles
        .values()
        .any(|r| r["brandId"] == role["brandId"] && r["name"] == role["name"]);
    if duplicate {
        return (StatusCode::CONFLICT, Json(json!({ "error": "duplicate role" })));
    }
    let id = role["id"].as_str().unwrap_or_default().to_string();
    store.roles.insert(id, role.clone());
    (StatusCode::CREATED, Json(role))
}

async fn get_user(
    State(store): State<Store>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let store = store.lock().unwrap();
    store.users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn put_user(
    State(store): State<Store>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let mut store = store.lock().unwrap();
    let user = store.users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    user["roleId"] = patch["roleId"].clone();
    Ok(Json(user.clone()))
}

async fn spawn_remote(store: Store) -> String {
    let app = Router::new()
        .route("/api/roles", get(list_roles).post(create_role))
        .route(
            "/api/roles/{id}",
            get(get_role).put(put_role).delete(delete_role),
        )
        .route("/api/users/{id}", get(get_user).put(put_user))
        .with_state(store);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

#[tokio::test]
async fn test_rest_api_repository_role_round_trip() {
    let store: Store = Arc::default();
    let base_url = spawn_remote(store.clone()).await;
    let repo = RestApiRepository::new(
        &base_url,
        Some("secret-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    let created = RoleRepository::create(&repo, Role::new("Project manager", "brand1"))
        .await
        .unwrap();
    assert_eq!(created.permissions, blank_tree());
    assert!(matches!(
        RoleRepository::create(&repo, Role::new("Project manager", "brand1")).await,
        Err(RepositoryError::Conflict(_))
    ));

    let fetched = RoleRepository::find_by_id(&repo, &created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.name, "Project manager");
    assert_eq!(
        store.lock().unwrap().last_auth.as_deref(),
        Some("Bearer secret-token")
    );

    let granted = blank_tree().toggled(&[capability::FINANCE]).unwrap();
    let updated = repo.update_permissions(&created.id, &granted).await.unwrap();
    assert!(updated.has_capability(capability::FINANCE_EXPORT));

    let listed = repo.list_for_brand("brand1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(repo.list_for_brand("brand2").await.unwrap().is_empty());

    repo.delete(&created.id).await.unwrap();
    assert!(
        RoleRepository::find_by_id(&repo, &created.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        repo.delete(&created.id).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_rest_api_repository_user_role_assignment() {
    let store: Store = Arc::default();
    store.lock().unwrap().users.insert(
        "u1".to_string(),
        json!({ "id": "u1", "email": "u1@example.com", "brandId": "brand1", "roleId": null }),
    );
    let base_url = spawn_remote(store).await;
    let repo = RestApiRepository::new(&base_url, None, Duration::from_secs(5)).unwrap();

    let user = repo.set_role("u1", Some("r1")).await.unwrap();
    assert_eq!(user.role_id.as_deref(), Some("r1"));
    let user = UserRepository::find_by_id(&repo, "u1").await.unwrap().unwrap();
    assert_eq!(user.brand_id, "brand1");
    assert!(
        UserRepository::find_by_id(&repo, "nobody")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_rest_api_repository_unreachable_remote() {
    let repo =
        RestApiRepository::new("http://127.0.0.1:9/api", None, Duration::from_secs(1)).unwrap();
    assert!(matches!(
        RoleRepository::find_by_id(&repo, "r1").await,
        Err(RepositoryError::Http(_))
    ));
}

// ============================================================================
// POSTGRES REPOSITORIES
// ============================================================================

#[tokio::test]
async fn test_postgres_repositories() {
    // Skip if no database connection available
    let database_url = std::env::var("DATABASE_URL").ok();
    if database_url.is_none() {
        eprintln!("Skipping Postgres repository tests - no DATABASE_URL");
        return;
    }

    let pool = PgPool::connect(&database_url.unwrap()).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let roles = PostgresRoleRepository::new(pool.clone());
    let users = PostgresUserRepository::new(pool.clone());
    let brand_id = format!("test-brand-{}", uuid::Uuid::new_v4());

    let role = roles.create(Role::new("Estimator", &brand_id)).await.unwrap();
    assert!(matches!(
        roles.create(Role::new("ESTIMATOR", &brand_id)).await,
        Err(RepositoryError::Conflict(_))
    ));
    let granted = blank_tree().toggled(&[capability::DOCUMENTS_UPLOAD]);
    assert!(granted.is_err());
    let granted = blank_tree().toggled(&["documents"]).unwrap();
    let updated = roles.update_permissions(&role.id, &granted).await.unwrap();
    assert!(updated.has_capability(capability::DOCUMENTS_UPLOAD));
    assert_eq!(roles.list_for_brand(&brand_id).await.unwrap().len(), 1);

    let user_id = format!("test-user-{}", uuid::Uuid::new_v4());
    sqlx::query("INSERT INTO users (id, email, brand_id) VALUES ($1, $2, $3)")
        .bind(&user_id)
        .bind(format!("{user_id}@example.com"))
        .bind(&brand_id)
        .execute(&pool)
        .await
        .unwrap();
    let user = users.set_role(&user_id, Some(&role.id)).await.unwrap();
    assert_eq!(user.role_id.as_deref(), Some(role.id.as_str()));

    roles.delete(&role.id).await.unwrap();
    let user = UserRepository::find_by_id(&users, &user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(user.role_id.is_none());

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(&user_id)
        .execute(&pool)
        .await
        .ok();
}
