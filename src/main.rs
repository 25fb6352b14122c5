use dotenvy::dotenv;
use fitout_access_service::interface::build_router;
use fitout_access_service::{AppConfig, AppError, AppStateBuilder, StorageBackend};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Access service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;

    let mut builder = AppStateBuilder::new().with_config(config.clone());
    if config.storage_backend == StorageBackend::Postgres {
        let database_url = config.database_url.as_deref().unwrap_or_default();
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        builder = builder.with_pool(pool);
    }
    let app_state = builder.build().await?;

    let http_addr = config.http_address();
    let listener = TcpListener::bind(&http_addr)
        .await
        .map_err(|e| AppError::Initialization(format!("Failed to bind {http_addr}: {e}")))?;
    info!(
        address = %http_addr,
        backend = ?config.storage_backend,
        "HTTP server running, Swagger UI at /swagger"
    );

    axum::serve(listener, build_router(app_state))
        .await
        .map_err(|e| AppError::Initialization(format!("HTTP server stopped: {e}")))
}
