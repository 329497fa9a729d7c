//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use checkout_core::{Cart, CartItemId, Money, ProductId, Quantity};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::services::CheckoutError;
use crate::state::AppState;
use crate::store::CommerceStore;

/// Cart with its computed totals.
#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: Cart,
    pub total: Money,
    pub item_count: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        let item_count = cart.item_count();
        Self {
            cart,
            total,
            item_count,
        }
    }
}

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of `PATCH /cart/items/{item_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

fn quantity(value: i64) -> Result<Quantity> {
    Quantity::try_from(value).map_err(|_| AppError::Checkout(CheckoutError::InvalidQuantity))
}

/// `GET /cart`
pub async fn show<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().get_or_create_cart(identity.user_id).await?;
    Ok(Json(cart.into()))
}

/// `POST /cart/items`
pub async fn add_item<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    let cart = state
        .carts()
        .add_item(identity.user_id, body.product_id, quantity(body.quantity)?)
        .await?;
    Ok(Json(cart.into()))
}

/// `PATCH /cart/items/{item_id}`
pub async fn update_item<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Path(item_id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>> {
    let cart = state
        .carts()
        .update_item(identity.user_id, item_id, quantity(body.quantity)?)
        .await?;
    Ok(Json(cart.into()))
}

/// `DELETE /cart/items/{item_id}`
pub async fn remove_item<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().remove_item(identity.user_id, item_id).await?;
    Ok(Json(cart.into()))
}

/// `DELETE /cart`
pub async fn clear<S: CommerceStore>(
    State(state): State<AppState<S>>,
    RequireUser(identity): RequireUser,
) -> Result<Json<CartResponse>> {
    let cart = state.carts().clear(identity.user_id).await?;
    Ok(Json(cart.into()))
}
