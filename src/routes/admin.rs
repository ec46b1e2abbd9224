use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Balance, Instrument, User};
use crate::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/user/:id", delete(delete_user))
        .route("/instrument", post(register_instrument))
        .route("/instrument/:ticker", delete(delete_instrument))
        .route("/balance/deposit", post(deposit))
        .route("/balance/withdraw", post(withdraw))
}

async fn delete_user(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<Json<User>> {
    let user = User::delete_cascading(&state.pool, user_id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct RegisterInstrumentRequest {
    ticker: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn register_instrument(
    State(state): State<AppState>,
    Json(req): Json<RegisterInstrumentRequest>,
) -> Result<Json<SuccessResponse>> {
    Instrument::register(&state.pool, &req.ticker, &req.name).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn delete_instrument(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<SuccessResponse>> {
    Instrument::delete_cascading(&state.pool, &ticker).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
struct DepositWithdrawRequest {
    user_id: Uuid,
    ticker: String,
    amount: i64,
}

async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositWithdrawRequest>,
) -> Result<Json<SuccessResponse>> {
    if req.amount <= 0 {
        return Err(crate::error::Error::Validation("amount must be positive".into()));
    }
    Instrument::ensure_fiat(&state.pool, &req.ticker).await?;
    Balance::credit(&state.pool, req.user_id, &req.ticker, req.amount).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn withdraw(
    State(state): State<AppState>,
    Json(req): Json<DepositWithdrawRequest>,
) -> Result<Json<SuccessResponse>> {
    if req.amount <= 0 {
        return Err(crate::error::Error::Validation("amount must be positive".into()));
    }
    Balance::debit(&state.pool, req.user_id, &req.ticker, req.amount).await?;
    Ok(Json(SuccessResponse { success: true }))
}
