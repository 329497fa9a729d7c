//! Orders created at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Money, OrderId, OrderItemId, OrderStatus, ProductId, Quantity, UserId};

/// An immutable record of a checkout. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    /// Computed once at checkout from live catalog prices.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    /// Catalog price at checkout.
    pub price_at_order: Money,
}

impl OrderItem {
    /// `price_at_order × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price_at_order.line_total(self.quantity)
    }
}

impl Order {
    /// Whether `user_id` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
