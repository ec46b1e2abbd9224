use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Instrument, Trade, User};
use crate::{orderbook, AppState};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/instrument", get(list_instruments))
        .route("/orderbook/:ticker", get(get_orderbook))
        .route("/transactions/:ticker", get(get_transactions))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
}

async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> Result<Json<User>> {
    let user = User::register(&state.pool, &req.name).await?;
    Ok(Json(user))
}

async fn list_instruments(State(state): State<AppState>) -> Result<Json<Vec<Instrument>>> {
    let instruments = Instrument::list(&state.pool).await?;
    Ok(Json(instruments))
}

#[derive(Debug, Deserialize)]
struct DepthQuery {
    limit: Option<usize>,
}

const DEFAULT_DEPTH: usize = 10;
const MAX_DEPTH: usize = 25;

async fn get_orderbook(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<orderbook::L2OrderBook>> {
    let limit = query.limit.unwrap_or(DEFAULT_DEPTH).min(MAX_DEPTH);
    let book = orderbook::view(&state.pool, &ticker, limit).await?;
    Ok(Json(book))
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<i64>,
}

const DEFAULT_RECENT: i64 = 10;
const MAX_RECENT: i64 = 100;

async fn get_transactions(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Trade>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
    let trades = Trade::recent(&state.pool, &ticker, limit).await?;
    Ok(Json(trades))
}
