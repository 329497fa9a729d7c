//! Cart manager: lazily materialises and mutates each user's single cart.
//!
//! Stock checks here are advisory reads without a lock. Enforcement happens
//! at checkout.

use std::sync::Arc;

use tracing::instrument;

use checkout_core::{Cart, CartId, CartItemId, Money, Product, ProductId, Quantity, UserId};

use super::error::{CheckoutError, CheckoutResult};
use super::inventory::ensure_covers;
use crate::store::{CartStore, Catalog, StoreTx, UserDirectory};

/// Per-user cart operations.
///
/// Each public operation runs in its own short transaction. The `*_in`
/// variants run inside a caller's transaction.
pub struct CartManager<S> {
    store: Arc<S>,
}

impl<S> Clone for CartManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for CartManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager").finish_non_exhaustive()
    }
}

impl<S: CartStore + Catalog + UserDirectory> CartManager<S> {
    /// Create a cart manager over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The user's cart with all lines, created empty on first access.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::UserNotFound` if the user does not exist and
    /// has no cart yet.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: UserId) -> CheckoutResult<Cart> {
        let mut tx = self.store.begin().await?;
        let cart = self.get_or_create_in(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Add `quantity` units of a product, merging into an existing line.
    ///
    /// A new line snapshots the current catalog price; a merged line keeps
    /// its original `price_at_add`.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::ProductNotFound` / `ProductUnavailable` for a missing
    ///   or inactive product
    /// - `CheckoutError::InsufficientStock` if the cumulative quantity exceeds stock
    /// - `CheckoutError::InvalidQuantity` if the merged quantity overflows
    /// - `CheckoutError::UserNotFound` if the user does not exist
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> CheckoutResult<Cart> {
        let mut tx = self.store.begin().await?;
        let cart = self.get_or_create_in(&mut tx, user_id).await?;
        let product = self.sellable_product(&mut tx, product_id).await?;

        match cart.find_product_line(product_id) {
            Some(line) => {
                let merged = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CheckoutError::InvalidQuantity)?;
                ensure_covers(&product, i64::from(merged.get()))?;
                self.store
                    .update_cart_item_quantity(&mut tx, line.id, merged)
                    .await?;
            }
            None => {
                ensure_covers(&product, i64::from(quantity.get()))?;
                self.store
                    .insert_cart_item(&mut tx, cart.id, &product, quantity)
                    .await?;
            }
        }

        let cart = self.reload(&mut tx, user_id).await?;
        tx.commit().await?;
        tracing::info!(cart_id = %cart.id, lines = cart.items.len(), "item added to cart");
        Ok(cart)
    }

    /// Overwrite the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::ItemNotFound` if the line is not in the user's cart
    /// - `CheckoutError::InsufficientStock` if `quantity` exceeds stock
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> CheckoutResult<Cart> {
        let mut tx = self.store.begin().await?;
        let cart = self.get_or_create_in(&mut tx, user_id).await?;
        let line = cart.find_item(item_id).ok_or(CheckoutError::ItemNotFound)?;

        let product = self
            .store
            .find_product(&mut tx, line.product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound)?;
        ensure_covers(&product, i64::from(quantity.get()))?;

        if !self
            .store
            .update_cart_item_quantity(&mut tx, item_id, quantity)
            .await?
        {
            return Err(CheckoutError::ItemNotFound);
        }

        let cart = self.reload(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Delete one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ItemNotFound` if the line is not in the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> CheckoutResult<Cart> {
        let mut tx = self.store.begin().await?;
        let cart = self.get_or_create_in(&mut tx, user_id).await?;
        if cart.find_item(item_id).is_none()
            || !self.store.delete_cart_item(&mut tx, item_id).await?
        {
            return Err(CheckoutError::ItemNotFound);
        }

        let cart = self.reload(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Delete every line. Clearing an empty cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::UserNotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> CheckoutResult<Cart> {
        let mut tx = self.store.begin().await?;
        let mut cart = self.get_or_create_in(&mut tx, user_id).await?;
        if !cart.is_empty() {
            self.clear_in(&mut tx, cart.id).await?;
            cart = self.reload(&mut tx, user_id).await?;
        }
        tx.commit().await?;
        Ok(cart)
    }

    /// Sum of `price_at_add × quantity`; zero for an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::UserNotFound` if the user does not exist.
    pub async fn total(&self, user_id: UserId) -> CheckoutResult<Money> {
        Ok(self.get_or_create_cart(user_id).await?.total())
    }

    // =========================================================================
    // Transaction-scoped helpers
    // =========================================================================

    /// The user's cart inside `tx`, or `None` if none was ever created.
    ///
    /// Holds the cart lock until `tx` ends, so two checkouts of one cart run
    /// one after the other and the second sees the cleared cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn load_in(&self, tx: &mut S::Tx, user_id: UserId) -> CheckoutResult<Option<Cart>> {
        Ok(self.store.lock_cart(tx, user_id).await?)
    }

    /// Delete every line of `cart_id` inside `tx`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn clear_in(&self, tx: &mut S::Tx, cart_id: CartId) -> CheckoutResult<u64> {
        Ok(self.store.delete_cart_items(tx, cart_id).await?)
    }

    async fn get_or_create_in(&self, tx: &mut S::Tx, user_id: UserId) -> CheckoutResult<Cart> {
        if let Some(cart) = self.store.lock_cart(tx, user_id).await? {
            return Ok(cart);
        }
        if self.store.find_user(tx, user_id).await?.is_none() {
            return Err(CheckoutError::UserNotFound);
        }
        tracing::debug!("creating cart");
        Ok(self.store.ensure_cart(tx, user_id).await?)
    }

    async fn reload(&self, tx: &mut S::Tx, user_id: UserId) -> CheckoutResult<Cart> {
        self.store
            .find_cart(tx, user_id)
            .await?
            .ok_or(CheckoutError::UserNotFound)
    }

    async fn sellable_product(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
    ) -> CheckoutResult<Product> {
        let product = self
            .store
            .find_product(tx, product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound)?;
        if !product.is_active {
            return Err(CheckoutError::ProductUnavailable {
                product_id,
                name: product.name,
            });
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use checkout_core::{User, UserRole};

    use super::*;
    use crate::store::MemoryStore;

    fn product(cents: u32, stock: i32) -> Product {
        Product {
            id: ProductId::new_v4(),
            name: "Papaya".to_owned(),
            description: String::new(),
            price: Money::from_cents(cents),
            stock,
            is_active: true,
        }
    }

    fn qty(n: i32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn setup() -> (Arc<MemoryStore>, CartManager<MemoryStore>, UserId) {
        let store = Arc::new(MemoryStore::new());
        let user = User {
            id: UserId::new_v4(),
            email: "shopper@example.com".to_owned(),
            first_name: "Sam".to_owned(),
            last_name: "Shopper".to_owned(),
            role: UserRole::User,
            created_at: Utc::now(),
        };
        let user_id = user.id;
        store.insert_user(user).await;
        (Arc::clone(&store), CartManager::new(store), user_id)
    }

    #[tokio::test]
    async fn test_cart_is_created_lazily_once() {
        let (_store, carts, user_id) = setup().await;
        let first = carts.get_or_create_cart(user_id).await.unwrap();
        let second = carts.get_or_create_cart(user_id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_cart() {
        let (_store, carts, _) = setup().await;
        let err = carts.get_or_create_cart(UserId::new_v4()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::UserNotFound));
    }

    #[tokio::test]
    async fn test_adding_same_product_merges_lines() {
        let (store, carts, user_id) = setup().await;
        let p = product(1000, 5);
        store.insert_product(p.clone()).await;

        carts.add_item(user_id, p.id, qty(1)).await.unwrap();
        let cart = carts.add_item(user_id, p.id, qty(2)).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, qty(3));
        assert_eq!(cart.total(), Money::from_cents(3000));
    }

    #[tokio::test]
    async fn test_merged_line_keeps_first_price() {
        let (store, carts, user_id) = setup().await;
        let p = product(1000, 5);
        store.insert_product(p.clone()).await;

        carts.add_item(user_id, p.id, qty(1)).await.unwrap();
        store.set_price(p.id, Money::from_cents(1500)).await;
        let cart = carts.add_item(user_id, p.id, qty(1)).await.unwrap();

        assert_eq!(cart.items[0].price_at_add, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_merge_past_quantity_limit_is_rejected() {
        let (store, carts, user_id) = setup().await;
        let p = product(1, i32::MAX);
        store.insert_product(p.clone()).await;

        carts.add_item(user_id, p.id, qty(i32::MAX)).await.unwrap();
        let err = carts.add_item(user_id, p.id, qty(1)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity));

        let cart = carts.get_or_create_cart(user_id).await.unwrap();
        assert_eq!(cart.items[0].quantity, qty(i32::MAX));
    }

    #[tokio::test]
    async fn test_cumulative_quantity_is_checked_against_stock() {
        let (store, carts, user_id) = setup().await;
        let p = product(100, 3);
        store.insert_product(p.clone()).await;

        carts.add_item(user_id, p.id, qty(2)).await.unwrap();
        let err = carts.add_item(user_id, p.id, qty(2)).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));

        let cart = carts.get_or_create_cart(user_id).await.unwrap();
        assert_eq!(cart.items[0].quantity, qty(2));
    }

    #[tokio::test]
    async fn test_inactive_product_is_unavailable() {
        let (store, carts, user_id) = setup().await;
        let mut p = product(100, 3);
        p.is_active = false;
        store.insert_product(p.clone()).await;

        let err = carts.add_item(user_id, p.id, qty(1)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_update_and_remove_item() {
        let (store, carts, user_id) = setup().await;
        let p = product(250, 10);
        store.insert_product(p.clone()).await;

        let cart = carts.add_item(user_id, p.id, qty(1)).await.unwrap();
        let item_id = cart.items[0].id;

        let cart = carts.update_item(user_id, item_id, qty(4)).await.unwrap();
        assert_eq!(cart.items[0].quantity, qty(4));
        assert_eq!(carts.total(user_id).await.unwrap(), Money::from_cents(1000));

        assert!(matches!(
            carts.update_item(user_id, item_id, qty(11)).await,
            Err(CheckoutError::InsufficientStock { .. })
        ));

        let cart = carts.remove_item(user_id, item_id).await.unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            carts.remove_item(user_id, item_id).await,
            Err(CheckoutError::ItemNotFound)
        ));
    }

    #[tokio::test]
    async fn test_cannot_touch_another_users_line() {
        let (store, carts, user_id) = setup().await;
        let p = product(250, 10);
        store.insert_product(p.clone()).await;
        let cart = carts.add_item(user_id, p.id, qty(1)).await.unwrap();

        let other = User {
            id: UserId::new_v4(),
            email: "other@example.com".to_owned(),
            first_name: "Other".to_owned(),
            last_name: "User".to_owned(),
            role: UserRole::User,
            created_at: Utc::now(),
        };
        let other_id = other.id;
        store.insert_user(other).await;

        assert!(matches!(
            carts.remove_item(other_id, cart.items[0].id).await,
            Err(CheckoutError::ItemNotFound)
        ));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, carts, user_id) = setup().await;
        let p = product(250, 10);
        store.insert_product(p.clone()).await;
        carts.add_item(user_id, p.id, qty(2)).await.unwrap();

        let cleared = carts.clear(user_id).await.unwrap();
        assert!(cleared.is_empty());
        let again = carts.clear(user_id).await.unwrap();
        assert_eq!(again, cleared);
        assert_eq!(store.stock_of(p.id).await, Some(10));
    }
}
