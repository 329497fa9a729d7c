//! Storage seams used by the checkout services.
//!
//! Every service operation receives an explicit transaction value (`Store::Tx`)
//! instead of reaching for a shared connection. Dropping a transaction without
//! calling [`StoreTx::commit`] rolls it back, so an early `?` return can never
//! leave partial writes behind.
//!
//! The collaborator traits ([`Catalog`], [`UserDirectory`], [`StockStore`],
//! [`CartStore`], [`OrderStore`]) all extend [`Store`], which pins them to one
//! transaction type.
//!
//! # Implementations
//!
//! - [`crate::db::PgStore`] - `PostgreSQL` via `sqlx`
//! - [`memory::MemoryStore`] - in-process, used by tests and local runs
//!
//! # Fetch depth
//!
//! - Cart reads return the cart with all lines and each line's product name.
//!   [`CartStore::lock_cart`] and [`CartStore::ensure_cart`] also hold the cart
//!   row lock, which serialises checkout against every other cart write.
//! - Order reads return the order with all lines.
//! - Product reads are single rows; [`Catalog::lock_product`] additionally
//!   holds the row lock until the transaction ends.

pub mod memory;

use std::future::Future;

use checkout_core::{
    Cart, CartId, CartItem, CartItemId, Money, Order, OrderId, OrderItem, OrderStatus, Product,
    ProductId, Quantity, User, UserId,
};

use crate::db::RepositoryError;

pub use memory::{MemoryStore, MemoryTx};

/// Result alias for storage calls.
pub type StoreResult<T> = Result<T, RepositoryError>;

/// An open transaction.
pub trait StoreTx: Send {
    /// Make every write in this transaction durable.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// A storage backend that can open transactions.
pub trait Store: Send + Sync + 'static {
    /// Transaction handle threaded through every collaborator call.
    type Tx: StoreTx;

    /// Open a new transaction.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Tx>> + Send;

    /// Verify the backend is reachable.
    fn ping(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Read access to the product catalog.
pub trait Catalog: Store {
    /// Read a product without locking it.
    fn find_product(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
    ) -> impl Future<Output = StoreResult<Option<Product>>> + Send;

    /// Read a product and hold its row lock until the transaction ends.
    fn lock_product(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
    ) -> impl Future<Output = StoreResult<Option<Product>>> + Send;
}

/// Lookup of registered users.
pub trait UserDirectory: Store {
    /// Find a user by ID.
    fn find_user(
        &self,
        tx: &mut Self::Tx,
        id: UserId,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;
}

/// Conditional stock writes. Only the inventory ledger calls these.
pub trait StockStore: Store {
    /// Decrement stock by `quantity` if and only if `stock >= quantity`,
    /// checked and applied as a single write.
    ///
    /// Returns `false` when the product is missing or stock is insufficient.
    fn decrement_stock_if_available(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Increment stock by `quantity`. Returns `false` if the product is missing.
    fn increment_stock(
        &self,
        tx: &mut Self::Tx,
        id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// Persistence of carts and their lines.
pub trait CartStore: Store {
    /// Find a user's cart with its lines.
    fn find_cart(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> impl Future<Output = StoreResult<Option<Cart>>> + Send;

    /// Find a user's cart with its lines and hold the cart row lock until
    /// the transaction ends.
    ///
    /// Lines are read after the lock is granted, so a caller that waited
    /// sees what the previous holder committed.
    fn lock_cart(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> impl Future<Output = StoreResult<Option<Cart>>> + Send;

    /// The user's cart, created empty if missing, with the cart row lock held.
    ///
    /// Concurrent first calls for one user all succeed and return the same cart.
    fn ensure_cart(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> impl Future<Output = StoreResult<Cart>> + Send;

    /// Add a line, snapshotting `product.price` as `price_at_add`.
    fn insert_cart_item(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
        product: &Product,
        quantity: Quantity,
    ) -> impl Future<Output = StoreResult<CartItem>> + Send;

    /// Overwrite a line's quantity. Returns `false` if the line is missing.
    fn update_cart_item_quantity(
        &self,
        tx: &mut Self::Tx,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Delete one line. Returns `false` if the line is missing.
    fn delete_cart_item(
        &self,
        tx: &mut Self::Tx,
        item_id: CartItemId,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Delete every line of a cart, keeping the cart row. Returns the number removed.
    fn delete_cart_items(
        &self,
        tx: &mut Self::Tx,
        cart_id: CartId,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// Persistence of orders and their lines.
pub trait OrderStore: Store {
    /// Insert an order row with status `Pending` and no lines.
    fn insert_order(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        total_amount: Money,
        shipping_address: &str,
    ) -> impl Future<Output = StoreResult<Order>> + Send;

    /// Insert one order line.
    fn insert_order_item(
        &self,
        tx: &mut Self::Tx,
        order_id: OrderId,
        product: &Product,
        quantity: Quantity,
    ) -> impl Future<Output = StoreResult<OrderItem>> + Send;

    /// Read an order with its lines.
    fn find_order(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> impl Future<Output = StoreResult<Option<Order>>> + Send;

    /// Read an order with its lines and hold the order row lock.
    fn lock_order(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> impl Future<Output = StoreResult<Option<Order>>> + Send;

    /// A user's orders, newest first.
    fn list_orders_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
    ) -> impl Future<Output = StoreResult<Vec<Order>>> + Send;

    /// Every order, newest first.
    fn list_all_orders(
        &self,
        tx: &mut Self::Tx,
    ) -> impl Future<Output = StoreResult<Vec<Order>>> + Send;

    /// Overwrite an order's status. Returns `false` if the order is missing.
    fn update_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

/// Everything the checkout services need from one backend.
pub trait CommerceStore: Catalog + UserDirectory + StockStore + CartStore + OrderStore {}

impl<T> CommerceStore for T where T: Catalog + UserDirectory + StockStore + CartStore + OrderStore {}
