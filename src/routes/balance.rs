use std::collections::HashMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::error::Result;
use crate::models::{Balance, User};
use crate::AppState;

pub fn balance_routes() -> Router<AppState> {
    Router::new().route("/", get(get_balance))
}

async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<HashMap<String, i64>>> {
    let snapshot = Balance::snapshot(&state.pool, user.id).await?;
    Ok(Json(snapshot))
}
