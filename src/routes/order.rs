use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Order, PlaceOrderBody, User};
use crate::AppState;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:id", get(get_order).delete(cancel_order))
}

#[derive(Debug, Serialize)]
struct PlaceOrderResponse {
    success: bool,
    order_id: Uuid,
}

async fn place_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<PlaceOrderBody>,
) -> Result<Json<PlaceOrderResponse>> {
    let order_id = Order::place(&state.pool, user.id, body).await?;
    Ok(Json(PlaceOrderResponse {
        success: true,
        order_id,
    }))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Order>>> {
    let orders = Order::list_by_user(&state.pool, user.id).await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = Order::get(&state.pool, user.id, order_id).await?;
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    success: bool,
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CancelResponse>> {
    Order::cancel(&state.pool, user.id, order_id).await?;
    Ok(Json(CancelResponse { success: true }))
}
