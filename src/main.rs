use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use mini_exchange::auth::{admin_middleware, auth_middleware};
use mini_exchange::config::Config;
use mini_exchange::models::User;
use mini_exchange::routes::{admin_routes, balance_routes, order_routes, public_routes};
use mini_exchange::{db, AppState};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mini_exchange=debug".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Config::from_env();

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    bootstrap_admin(&pool, config.admin_api_key.as_deref()).await?;
    mini_exchange::models::Instrument::ensure_fiat(&pool, "USD").await.ok();

    let state = AppState { pool };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1/public", public_routes())
        .nest(
            "/api/v1/balance",
            balance_routes().layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/api/v1/order",
            order_routes().layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/api/v1/admin",
            admin_routes()
                .layer(middleware::from_fn(admin_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("mini-exchange listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Creates the admin row on startup if none exists. Uses `ADMIN_API_KEY`
/// when set, otherwise generates one and logs it once.
async fn bootstrap_admin(pool: &sqlx::PgPool, configured_key: Option<&str>) -> anyhow::Result<()> {
    if User::any_admin_exists(pool).await? {
        return Ok(());
    }

    let api_key = configured_key
        .map(|k| k.to_string())
        .unwrap_or_else(|| format!("key-{}", uuid::Uuid::new_v4()));

    User::create_admin(pool, "admin", &api_key).await?;

    if configured_key.is_none() {
        tracing::info!("generated admin api key: {}", api_key);
    }

    Ok(())
}
