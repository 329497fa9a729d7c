//! Order workflow: checkout, lifecycle transitions and cancellation.
//!
//! # Checkout
//!
//! `create_order` runs in one transaction:
//!
//! 1. Load the cart (fails with `EmptyCart` if it has no lines)
//! 2. Lock every product row in ascending product-id order and re-validate
//!    it against the live catalog
//! 3. Price every line at the live catalog price
//! 4. Insert the order and its lines, reserving stock line by line
//! 5. Clear the cart and commit
//!
//! Any error drops the transaction, which rolls everything back: no order,
//! no stock change, cart untouched.

use std::sync::Arc;

use tracing::instrument;

use checkout_core::{
    Money, Order, OrderId, OrderStatus, Product, ProductId, Quantity, UserId, UserRole,
};

use super::cart::CartManager;
use super::error::{CheckoutError, CheckoutResult};
use super::inventory::{InventoryLedger, ensure_covers};
use crate::store::{CommerceStore, StoreTx};

/// How `update_status` treats administrative status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any status may be written, including jumps and re-opening terminal
    /// orders. Stock is not touched.
    #[default]
    Permissive,
    /// Only lifecycle arcs are accepted; moving to `Cancelled` restores stock
    /// exactly like a customer cancellation.
    ForwardOnly,
}

impl std::str::FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "forward_only" => Ok(Self::ForwardOnly),
            _ => Err(format!("unknown status policy: {s}")),
        }
    }
}

/// Transactional orchestrator for orders.
pub struct OrderWorkflow<S> {
    store: Arc<S>,
    carts: CartManager<S>,
    ledger: InventoryLedger<S>,
    policy: StatusPolicy,
}

impl<S> Clone for OrderWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            carts: self.carts.clone(),
            ledger: self.ledger.clone(),
            policy: self.policy,
        }
    }
}

impl<S> std::fmt::Debug for OrderWorkflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderWorkflow")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S: CommerceStore> OrderWorkflow<S> {
    /// Compose a workflow from its collaborators with the permissive policy.
    #[must_use]
    pub fn new(store: Arc<S>, carts: CartManager<S>, ledger: InventoryLedger<S>) -> Self {
        Self {
            store,
            carts,
            ledger,
            policy: StatusPolicy::default(),
        }
    }

    /// Replace the status policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active status policy.
    #[must_use]
    pub const fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Convert the user's cart into a `Pending` order.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::InvalidShippingAddress` if the address is blank
    /// - `CheckoutError::EmptyCart` if the cart has no lines
    /// - `CheckoutError::ProductUnavailable` if a product was deactivated
    /// - `CheckoutError::InsufficientStock` if a line exceeds live stock
    /// - `CheckoutError::Repository` (possibly retryable) on storage failure
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        shipping_address: &str,
    ) -> CheckoutResult<Order> {
        let shipping_address = shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(CheckoutError::InvalidShippingAddress);
        }

        let mut tx = self.store.begin().await?;

        let cart = match self.carts.load_in(&mut tx, user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(CheckoutError::EmptyCart),
        };

        let mut lines: Vec<(ProductId, Quantity)> = cart
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();
        lines.sort_by_key(|(product_id, _)| *product_id);

        let mut priced: Vec<(Product, Quantity)> = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = self
                .store
                .lock_product(&mut tx, product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound)?;
            if !product.is_active {
                tracing::debug!(%product_id, "checkout rejected: product inactive");
                return Err(CheckoutError::ProductUnavailable {
                    product_id,
                    name: product.name,
                });
            }
            ensure_covers(&product, i64::from(quantity.get()))?;
            priced.push((product, quantity));
        }

        let total: Money = priced
            .iter()
            .map(|(product, quantity)| product.price.line_total(*quantity))
            .sum();

        let mut order = self
            .store
            .insert_order(&mut tx, user_id, total, shipping_address)
            .await?;
        for (product, quantity) in &priced {
            self.ledger.reserve(&mut tx, product.id, *quantity).await?;
            let item = self
                .store
                .insert_order_item(&mut tx, order.id, product, *quantity)
                .await?;
            order.items.push(item);
        }

        self.carts.clear_in(&mut tx, cart.id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            lines = order.items.len(),
            "order created"
        );
        Ok(order)
    }

    /// Administrative status change, governed by the workflow's [`StatusPolicy`].
    ///
    /// # Errors
    ///
    /// - `CheckoutError::OrderNotFound` if the order does not exist
    /// - `CheckoutError::InvalidTransition` under `ForwardOnly` for a
    ///   change outside the lifecycle arcs
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> CheckoutResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = self
            .store
            .lock_order(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        let from = order.status;

        if self.policy == StatusPolicy::ForwardOnly {
            if !from.can_transition_to(status) {
                return Err(CheckoutError::InvalidTransition { from, to: status });
            }
            if status == OrderStatus::Cancelled {
                self.release_items(&mut tx, &order).await?;
            }
        }

        self.set_status(&mut tx, order_id, status).await?;
        tx.commit().await?;

        order.status = status;
        tracing::info!(%order_id, %from, to = %status, "order status updated");
        Ok(order)
    }

    /// Cancel one of the user's own orders and restore its stock.
    ///
    /// Stock restoration and the status change commit together.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::OrderNotFound` if the order does not exist
    /// - `CheckoutError::Unauthorized` if another user placed the order
    /// - `CheckoutError::InvalidState` once the order has shipped or was cancelled
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> CheckoutResult<Order> {
        let mut tx = self.store.begin().await?;
        // Row lock: a concurrent cancel waits here and then sees `Cancelled`.
        let mut order = self
            .store
            .lock_order(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if !order.is_owned_by(user_id) {
            tracing::warn!(%order_id, "cancel attempted by non-owner");
            return Err(CheckoutError::Unauthorized);
        }
        if !order.status.is_cancellable() {
            return Err(CheckoutError::InvalidState {
                status: order.status,
                action: "cancel",
            });
        }

        self.release_items(&mut tx, &order).await?;
        self.set_status(&mut tx, order_id, OrderStatus::Cancelled)
            .await?;
        tx.commit().await?;

        order.status = OrderStatus::Cancelled;
        tracing::info!(%order_id, "order cancelled");
        Ok(order)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn find_all(&self, user_id: UserId) -> CheckoutResult<Vec<Order>> {
        let mut tx = self.store.begin().await?;
        let orders = self.store.list_orders_for_user(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(orders)
    }

    /// One order by ID.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order does not exist.
    pub async fn find_one(&self, order_id: OrderId) -> CheckoutResult<Order> {
        let mut tx = self.store.begin().await?;
        let order = self
            .store
            .find_order(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        tx.commit().await?;
        Ok(order)
    }

    /// One order as seen by `viewer`: admins see every order, users only
    /// their own. Hidden orders answer `OrderNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order does not exist or
    /// is not visible to the viewer.
    pub async fn find_visible(
        &self,
        order_id: OrderId,
        viewer: UserId,
        role: UserRole,
    ) -> CheckoutResult<Order> {
        let order = self.find_one(order_id).await?;
        if role.is_admin() || order.is_owned_by(viewer) {
            Ok(order)
        } else {
            Err(CheckoutError::OrderNotFound)
        }
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn find_all_orders(&self) -> CheckoutResult<Vec<Order>> {
        let mut tx = self.store.begin().await?;
        let orders = self.store.list_all_orders(&mut tx).await?;
        tx.commit().await?;
        Ok(orders)
    }

    async fn release_items(&self, tx: &mut S::Tx, order: &Order) -> CheckoutResult<()> {
        for item in &order.items {
            self.ledger.release(tx, item.product_id, item.quantity).await?;
        }
        Ok(())
    }

    async fn set_status(
        &self,
        tx: &mut S::Tx,
        order_id: OrderId,
        status: OrderStatus,
    ) -> CheckoutResult<()> {
        if self.store.update_order_status(tx, order_id, status).await? {
            Ok(())
        } else {
            Err(CheckoutError::OrderNotFound)
        }
    }
}
