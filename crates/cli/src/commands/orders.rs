//! Order administration commands.
//!
//! Status changes go through the same `OrderWorkflow` as the HTTP API and
//! honour `CHECKOUT_STATUS_POLICY`.

use checkout_core::{Order, OrderId, OrderStatus, UserId};
use checkout_server::state::AppState;

fn log_order(order: &Order) {
    tracing::info!(
        "{}  {}  {}  {} line(s)  user {}  {}",
        order.id,
        order.status,
        order.total_amount,
        order.items.len(),
        order.user_id,
        order.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
}

/// List orders, newest first; only `user`'s when given.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn list(user: Option<UserId>) -> Result<(), Box<dyn std::error::Error>> {
    let (store, config) = super::connect().await?;
    let state = AppState::new(store, config.status_policy);

    let orders = match user {
        Some(user_id) => state.orders().find_all(user_id).await?,
        None => state.orders().find_all_orders().await?,
    };

    tracing::info!("{} order(s)", orders.len());
    for order in &orders {
        log_order(order);
    }
    Ok(())
}

/// Change an order's status.
///
/// # Errors
///
/// Returns an error if the order does not exist, the policy rejects the
/// change, or the database cannot be reached.
pub async fn set_status(
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, config) = super::connect().await?;
    let state = AppState::new(store, config.status_policy);

    let order = state.orders().update_status(order_id, status).await?;
    tracing::info!("Order {} is now {}", order.id, order.status);
    log_order(&order);
    Ok(())
}
