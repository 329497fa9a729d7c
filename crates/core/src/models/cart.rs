//! Shopping cart and its lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CartId, CartItemId, Money, ProductId, Quantity, UserId};

/// A user's single mutable basket.
///
/// No total is stored; [`Cart::total`] computes it from the line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line in a cart. Unique per `(cart, product)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    /// Catalog price when the line was first added. Not refreshed on price changes.
    pub price_at_add: Money,
}

impl CartItem {
    /// `price_at_add × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price_at_add.line_total(self.quantity)
    }
}

impl Cart {
    /// Sum of line totals; zero for an empty cart.
    #[must_use]
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity.get())).sum()
    }

    /// Find a line by its ID.
    #[must_use]
    pub fn find_item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Find the line holding `product_id`, if any.
    #[must_use]
    pub fn find_product_line(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}
