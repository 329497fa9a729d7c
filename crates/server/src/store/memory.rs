//! In-process store.
//!
//! The whole state sits behind one `tokio::sync::Mutex`. A transaction owns the
//! lock for its lifetime together with a snapshot taken at `begin`; dropping it
//! without committing restores the snapshot. Transactions are therefore fully
//! serialized, which trivially satisfies the conditional-write requirements of
//! the inventory ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use checkout_core::{
    Cart, CartId, CartItem, CartItemId, Money, Order, OrderId, OrderItem, OrderItemId,
    OrderStatus, Product, ProductId, Quantity, User, UserId,
};

use super::{
    CartStore, Catalog, OrderStore, StockStore, Store, StoreResult, StoreTx, UserDirectory,
};
use crate::db::RepositoryError;

#[derive(Debug, Clone)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: Quantity,
    price_at_add: Money,
    seq: u64,
}

#[derive(Debug, Clone)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_amount: Money,
    status: OrderStatus,
    shipping_address: String,
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: Quantity,
    price_at_order: Money,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, CartRow>,
    cart_items: HashMap<CartItemId, CartItemRow>,
    orders: HashMap<OrderId, OrderRow>,
    order_items: Vec<OrderItemRow>,
    /// Insertion counter used to break `created_at` ties.
    seq: u64,
}

impl MemoryState {
    const fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn product_name(&self, id: ProductId) -> StoreResult<String> {
        self.products
            .get(&id)
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("line references missing product {id}"))
            })
    }

    fn assemble_cart(&self, row: &CartRow) -> StoreResult<Cart> {
        let mut lines: Vec<&CartItemRow> = self
            .cart_items
            .values()
            .filter(|i| i.cart_id == row.id)
            .collect();
        lines.sort_by_key(|i| i.seq);

        let items = lines
            .into_iter()
            .map(|i| {
                Ok(CartItem {
                    id: i.id,
                    cart_id: i.cart_id,
                    product_id: i.product_id,
                    product_name: self.product_name(i.product_id)?,
                    quantity: i.quantity,
                    price_at_add: i.price_at_add,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn assemble_order(&self, row: &OrderRow) -> StoreResult<Order> {
        let items = self
            .order_items
            .iter()
            .filter(|i| i.order_id == row.id)
            .map(|i| {
                Ok(OrderItem {
                    id: i.id,
                    order_id: i.order_id,
                    product_id: i.product_id,
                    product_name: self.product_name(i.product_id)?,
                    quantity: i.quantity,
                    price_at_order: i.price_at_order,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            items,
            total_amount: row.total_amount,
            status: row.status,
            shipping_address: row.shipping_address.clone(),
            created_at: row.created_at,
        })
    }

    fn orders_newest_first<'a>(
        &self,
        rows: impl Iterator<Item = &'a OrderRow>,
    ) -> StoreResult<Vec<Order>> {
        let mut rows: Vec<&OrderRow> = rows.collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        rows.into_iter().map(|r| self.assemble_order(r)).collect()
    }

    fn touch_cart(&mut self, cart_id: CartId) {
        if let Some(cart) = self.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }
    }
}

/// In-process [`super::CommerceStore`].
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

/// Transaction over a [`MemoryStore`].
///
/// Holds the store lock until committed or dropped.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::debug!("rolling back in-memory transaction");
            *self.guard = snapshot;
        }
    }
}

impl StoreTx for MemoryTx {
    #[allow(clippy::manual_async_fn)]
    fn commit(mut self) -> impl Future<Output = StoreResult<()>> + Send {
        self.snapshot = None;
        drop(self);
        async { Ok(()) }
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user.
    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Add or replace a catalog product.
    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Change a product's catalog price.
    ///
    /// Returns `false` if the product does not exist.
    pub async fn set_price(&self, id: ProductId, price: Money) -> bool {
        self.state
            .lock()
            .await
            .products
            .get_mut(&id)
            .map(|p| p.price = price)
            .is_some()
    }

    /// Activate or deactivate a product.
    ///
    /// Returns `false` if the product does not exist.
    pub async fn set_active(&self, id: ProductId, is_active: bool) -> bool {
        self.state
            .lock()
            .await
            .products
            .get_mut(&id)
            .map(|p| p.is_active = is_active)
            .is_some()
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    /// Number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(MemoryTx { guard, snapshot })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl Catalog for MemoryStore {
    async fn find_product(&self, tx: &mut MemoryTx, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(tx.guard.products.get(&id).cloned())
    }

    async fn lock_product(&self, tx: &mut MemoryTx, id: ProductId) -> StoreResult<Option<Product>> {
        // The transaction already holds the store-wide lock.
        Ok(tx.guard.products.get(&id).cloned())
    }
}

impl UserDirectory for MemoryStore {
    async fn find_user(&self, tx: &mut MemoryTx, id: UserId) -> StoreResult<Option<User>> {
        Ok(tx.guard.users.get(&id).cloned())
    }
}

impl StockStore for MemoryStore {
    async fn decrement_stock_if_available(
        &self,
        tx: &mut MemoryTx,
        id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        match tx.guard.products.get_mut(&id) {
            Some(product) if product.stock >= quantity.get() => {
                product.stock -= quantity.get();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_stock(
        &self,
        tx: &mut MemoryTx,
        id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        let Some(product) = tx.guard.products.get_mut(&id) else {
            return Ok(false);
        };
        product.stock = product
            .stock
            .checked_add(quantity.get())
            .ok_or_else(|| RepositoryError::DataCorruption(format!("stock overflow for {id}")))?;
        Ok(true)
    }
}

impl CartStore for MemoryStore {
    async fn find_cart(&self, tx: &mut MemoryTx, user_id: UserId) -> StoreResult<Option<Cart>> {
        let state = &*tx.guard;
        state
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .map(|row| state.assemble_cart(row))
            .transpose()
    }

    async fn lock_cart(&self, tx: &mut MemoryTx, user_id: UserId) -> StoreResult<Option<Cart>> {
        // The transaction already holds the whole store.
        self.find_cart(tx, user_id).await
    }

    async fn ensure_cart(&self, tx: &mut MemoryTx, user_id: UserId) -> StoreResult<Cart> {
        if let Some(cart) = self.find_cart(tx, user_id).await? {
            return Ok(cart);
        }
        let state = &mut *tx.guard;
        let now = Utc::now();
        let row = CartRow {
            id: CartId::new_v4(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        state.carts.insert(row.id, row.clone());
        state.assemble_cart(&row)
    }

    async fn insert_cart_item(
        &self,
        tx: &mut MemoryTx,
        cart_id: CartId,
        product: &Product,
        quantity: Quantity,
    ) -> StoreResult<CartItem> {
        let state = &mut *tx.guard;
        if state
            .cart_items
            .values()
            .any(|i| i.cart_id == cart_id && i.product_id == product.id)
        {
            return Err(RepositoryError::Conflict("cart line already exists".to_owned()));
        }
        let row = CartItemRow {
            id: CartItemId::new_v4(),
            cart_id,
            product_id: product.id,
            quantity,
            price_at_add: product.price,
            seq: state.next_seq(),
        };
        state.cart_items.insert(row.id, row.clone());
        state.touch_cart(cart_id);
        Ok(CartItem {
            id: row.id,
            cart_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            price_at_add: product.price,
        })
    }

    async fn update_cart_item_quantity(
        &self,
        tx: &mut MemoryTx,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        let state = &mut *tx.guard;
        let Some(item) = state.cart_items.get_mut(&item_id) else {
            return Ok(false);
        };
        item.quantity = quantity;
        let cart_id = item.cart_id;
        state.touch_cart(cart_id);
        Ok(true)
    }

    async fn delete_cart_item(&self, tx: &mut MemoryTx, item_id: CartItemId) -> StoreResult<bool> {
        let state = &mut *tx.guard;
        let Some(item) = state.cart_items.remove(&item_id) else {
            return Ok(false);
        };
        state.touch_cart(item.cart_id);
        Ok(true)
    }

    async fn delete_cart_items(&self, tx: &mut MemoryTx, cart_id: CartId) -> StoreResult<u64> {
        let state = &mut *tx.guard;
        let before = state.cart_items.len();
        state.cart_items.retain(|_, i| i.cart_id != cart_id);
        let removed = before - state.cart_items.len();
        if removed > 0 {
            state.touch_cart(cart_id);
        }
        Ok(removed as u64)
    }
}

impl OrderStore for MemoryStore {
    async fn insert_order(
        &self,
        tx: &mut MemoryTx,
        user_id: UserId,
        total_amount: Money,
        shipping_address: &str,
    ) -> StoreResult<Order> {
        let state = &mut *tx.guard;
        let row = OrderRow {
            id: OrderId::new_v4(),
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            shipping_address: shipping_address.to_owned(),
            created_at: Utc::now(),
            seq: state.next_seq(),
        };
        state.orders.insert(row.id, row.clone());
        state.assemble_order(&row)
    }

    async fn insert_order_item(
        &self,
        tx: &mut MemoryTx,
        order_id: OrderId,
        product: &Product,
        quantity: Quantity,
    ) -> StoreResult<OrderItem> {
        let state = &mut *tx.guard;
        if !state.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }
        let row = OrderItemRow {
            id: OrderItemId::new_v4(),
            order_id,
            product_id: product.id,
            quantity,
            price_at_order: product.price,
        };
        state.order_items.push(row.clone());
        Ok(OrderItem {
            id: row.id,
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            price_at_order: product.price,
        })
    }

    async fn find_order(&self, tx: &mut MemoryTx, id: OrderId) -> StoreResult<Option<Order>> {
        let state = &*tx.guard;
        state
            .orders
            .get(&id)
            .map(|row| state.assemble_order(row))
            .transpose()
    }

    async fn lock_order(&self, tx: &mut MemoryTx, id: OrderId) -> StoreResult<Option<Order>> {
        self.find_order(tx, id).await
    }

    async fn list_orders_for_user(
        &self,
        tx: &mut MemoryTx,
        user_id: UserId,
    ) -> StoreResult<Vec<Order>> {
        let state = &*tx.guard;
        state.orders_newest_first(state.orders.values().filter(|o| o.user_id == user_id))
    }

    async fn list_all_orders(&self, tx: &mut MemoryTx) -> StoreResult<Vec<Order>> {
        let state = &*tx.guard;
        state.orders_newest_first(state.orders.values())
    }

    async fn update_order_status(
        &self,
        tx: &mut MemoryTx,
        id: OrderId,
        status: OrderStatus,
    ) -> StoreResult<bool> {
        match tx.guard.orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new_v4(),
            name: "Mango".to_owned(),
            description: String::new(),
            price: Money::from_cents(500),
            stock,
            is_active: true,
        }
    }

    fn qty(n: i32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let p = product(5);
        store.insert_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        assert!(store.decrement_stock_if_available(&mut tx, p.id, qty(3)).await.unwrap());
        drop(tx);

        assert_eq!(store.stock_of(p.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_committed_transaction_persists() {
        let store = MemoryStore::new();
        let p = product(5);
        store.insert_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        assert!(store.decrement_stock_if_available(&mut tx, p.id, qty(5)).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(0));
    }

    #[tokio::test]
    async fn test_conditional_decrement_never_goes_negative() {
        let store = MemoryStore::new();
        let p = product(2);
        store.insert_product(p.clone()).await;

        let mut tx = store.begin().await.unwrap();
        assert!(!store.decrement_stock_if_available(&mut tx, p.id, qty(3)).await.unwrap());
        assert!(store.decrement_stock_if_available(&mut tx, p.id, qty(2)).await.unwrap());
        assert!(!store.decrement_stock_if_available(&mut tx, p.id, qty(1)).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(0));
    }

    #[tokio::test]
    async fn test_missing_product_is_not_decremented_or_incremented() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = ProductId::new_v4();
        assert!(!store.decrement_stock_if_available(&mut tx, id, qty(1)).await.unwrap());
        assert!(!store.increment_stock(&mut tx, id, qty(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cart_line_is_unique_per_product() {
        let store = MemoryStore::new();
        let p = product(5);
        store.insert_product(p.clone()).await;
        let user_id = UserId::new_v4();

        let mut tx = store.begin().await.unwrap();
        let cart = store.ensure_cart(&mut tx, user_id).await.unwrap();
        store.insert_cart_item(&mut tx, cart.id, &p, qty(1)).await.unwrap();
        let dup = store.insert_cart_item(&mut tx, cart.id, &p, qty(1)).await;
        assert!(matches!(dup, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_ensure_cart_returns_existing_cart() {
        let store = MemoryStore::new();
        let p = product(5);
        store.insert_product(p.clone()).await;
        let user_id = UserId::new_v4();

        let mut tx = store.begin().await.unwrap();
        let created = store.ensure_cart(&mut tx, user_id).await.unwrap();
        store.insert_cart_item(&mut tx, created.id, &p, qty(2)).await.unwrap();
        let again = store.ensure_cart(&mut tx, user_id).await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.items.len(), 1);
        let locked = store.lock_cart(&mut tx, user_id).await.unwrap().unwrap();
        assert_eq!(locked, again);
        assert!(store.lock_cart(&mut tx, UserId::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_orders_listed_newest_first() {
        let store = MemoryStore::new();
        let user_id = UserId::new_v4();

        let mut tx = store.begin().await.unwrap();
        let first = store.insert_order(&mut tx, user_id, Money::zero(), "a").await.unwrap();
        let second = store.insert_order(&mut tx, user_id, Money::zero(), "b").await.unwrap();
        let ids: Vec<_> = store
            .list_orders_for_user(&mut tx, user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
