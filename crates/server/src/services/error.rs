//! Caller-facing failures of the checkout services.

use thiserror::Error;

use checkout_core::{OrderStatus, ProductId};

use crate::db::RepositoryError;

/// Errors returned by [`super::CartManager`], [`super::InventoryLedger`] and
/// [`super::OrderWorkflow`].
///
/// Every variant except `Repository` is a recoverable business rejection.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The acting user is not registered.
    #[error("user not found")]
    UserNotFound,

    /// The referenced product does not exist.
    #[error("product not found")]
    ProductNotFound,

    /// The line is not in the acting user's cart.
    #[error("cart item not found")]
    ItemNotFound,

    /// The order does not exist (or is hidden from the caller).
    #[error("order not found")]
    OrderNotFound,

    /// The product is deactivated in the catalog.
    #[error("product {name} is not available")]
    ProductUnavailable { product_id: ProductId, name: String },

    /// Stock does not cover the requested quantity.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i32,
    },

    /// Checkout of a cart without lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Acting on another user's order.
    #[error("order belongs to another user")]
    Unauthorized,

    /// The order's status does not allow the action.
    #[error("cannot {action} an order that is {status}")]
    InvalidState {
        status: OrderStatus,
        action: &'static str,
    },

    /// Status change outside the lifecycle arcs (forward-only policy).
    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Quantity below one or beyond the storable range.
    #[error("quantity is out of range")]
    InvalidQuantity,

    /// Blank shipping address at checkout.
    #[error("shipping address is required")]
    InvalidShippingAddress,

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Whether the whole operation may be retried (lost a storage race).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(e) if e.is_retryable())
    }
}

/// Result alias for service operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_repository_races_are_retryable() {
        assert!(CheckoutError::from(RepositoryError::Retryable("40001".to_owned())).is_retryable());
        assert!(!CheckoutError::from(RepositoryError::NotFound).is_retryable());
        assert!(!CheckoutError::EmptyCart.is_retryable());
    }

    #[test]
    fn test_messages_name_the_state() {
        let err = CheckoutError::InvalidState {
            status: OrderStatus::Shipped,
            action: "cancel",
        };
        assert_eq!(err.to_string(), "cannot cancel an order that is shipped");
    }
}
