pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod orderbook;
pub mod routes;

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}
