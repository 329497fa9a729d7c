//! Catalog product as seen by the checkout flow.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId, Quantity};

/// A product row read from the catalog.
///
/// `stock` is never negative; only the inventory ledger changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i32,
    pub is_active: bool,
}

impl Product {
    /// Whether the current stock covers `quantity`.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: Quantity) -> bool {
        self.stock >= quantity.get()
    }
}
