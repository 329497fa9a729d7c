//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use checkout_core::{Order, OrderId, OrderStatus};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::state::AppState;
use crate::store::CommerceStore;

/// Body of `POST /orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
}

/// Body of `PATCH /orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `POST /orders`
pub async fn create<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state
        .orders()
        .create_order(identity.user_id, &body.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders`
pub async fn list_own<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().find_all(identity.user_id).await?))
}

/// `GET /orders/admin/all`
pub async fn list_all<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().find_all_orders().await?))
}

/// `GET /orders/{id}`
pub async fn show<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .find_visible(order_id, identity.user_id, identity.role)
        .await?;
    Ok(Json(order))
}

/// `PATCH /orders/{id}/status`
pub async fn update_status<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(order_id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = state.orders().update_status(order_id, body.status).await?;
    Ok(Json(order))
}

/// `PATCH /orders/{id}/cancel`
pub async fn cancel<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .cancel_order(identity.user_id, order_id)
        .await?;
    Ok(Json(order))
}
