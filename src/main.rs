use commerce_cart::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{process, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: pretty output locally, JSON lines in production.
fn init_logging(env: Env) {
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "commerce_cart=debug,tower_http=info,axum=trace".into());

    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}

/// main
///
/// Loads configuration, connects and migrates the database, then serves HTTP until
/// the process is stopped. Any startup failure is logged and exits with status 1.
#[tokio::main]
async fn main() {
    // 1. Environment: .env first, so both the log format and AppConfig see it.
    dotenv::dotenv().ok();
    init_logging(Env::from_env());

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("FATAL: invalid configuration: {}", e);
            process::exit(1);
        }
    };
    tracing::info!("Application starting in {:?} mode", config.env);

    // 2. Database Initialization (Postgres)
    let pool = match PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("FATAL: failed to connect to Postgres: {}", e);
            process::exit(1);
        }
    };
    tracing::info!("Database Connection is ready...");

    let repository = PostgresRepository::new(pool);
    if let Err(e) = repository.migrate().await {
        tracing::error!("FATAL: database migration failed: {}", e);
        process::exit(1);
    }
    let repo = Arc::new(repository) as RepositoryState;

    // 3. Unified State Assembly
    let bind_addr = config.bind_addr();
    let api_prefix = config.api_prefix.clone();
    let app_state = match AppState::new(repo, config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("FATAL: {}", e);
            process::exit(1);
        }
    };

    // 4. Router and Server Startup
    let app = create_router(app_state);

    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("FATAL: cannot bind {}: {}", bind_addr, e);
            process::exit(1);
        }
    };

    tracing::info!("Listening on {} (API under {:?})", bind_addr, api_prefix);
    tracing::info!("API Documentation (Swagger UI) available at: /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
        process::exit(1);
    }
}
