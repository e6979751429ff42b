//! Opsdesk API composition root.

#![forbid(unsafe_code)]

mod api_router;
mod auth;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use opsdesk_application::{
    AuthTokenService, AuthorizationService, PermissionCache, RoleRepository, RoleService,
    TokenRepository, UserRepository, UserService,
};
use opsdesk_core::AppError;
use opsdesk_infrastructure::{
    Argon2PasswordHasher, PostgresRoleRepository, PostgresTokenRepository, PostgresUserRepository,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);
    let token_ttl_hours = env::var("TOKEN_TTL_HOURS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(12);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let role_repository: Arc<dyn RoleRepository> =
        Arc::new(PostgresRoleRepository::new(pool.clone()));
    let user_repository: Arc<dyn UserRepository> =
        Arc::new(PostgresUserRepository::new(pool.clone()));
    let token_repository: Arc<dyn TokenRepository> =
        Arc::new(PostgresTokenRepository::new(pool.clone()));
    let password_hasher = Arc::new(Argon2PasswordHasher::new());

    dev_seed::run(
        role_repository.clone(),
        user_repository.clone(),
        password_hasher.clone(),
    )
    .await?;

    let permission_cache = Arc::new(PermissionCache::new(role_repository.clone()));
    permission_cache.invalidate().await?;

    let authorization_service = AuthorizationService::new(permission_cache.clone());
    let role_service = RoleService::new(
        role_repository,
        permission_cache.clone(),
        authorization_service.clone(),
    );
    let auth_token_service = AuthTokenService::new(token_repository, token_ttl_hours);
    let user_service = UserService::new(user_repository, password_hasher);

    let app_state = AppState {
        role_service,
        authorization_service,
        permission_cache,
        auth_token_service,
        user_service,
    };

    let app = api_router::build(app_state, &frontend_url)?;

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Validation(format!("invalid API_HOST: {error}")))?;
    let address = SocketAddr::new(host, api_port);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "opsdesk api listening");
    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name)
        .map_err(|_| AppError::Validation(format!("{name} environment variable is required")))
}
