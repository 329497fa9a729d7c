//! Integration tests for the checkout service.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store only
//! cargo test -p checkout-integration-tests
//!
//! # Also against PostgreSQL (migrations are applied automatically)
//! CHECKOUT_TEST_DATABASE_URL=postgres://localhost/checkout_test \
//!     cargo test -p checkout-integration-tests
//! ```
//!
//! The checkout properties live in [`scenarios`] and are written once,
//! generic over the backend. `tests/memory_checkout.rs` and
//! `tests/postgres_checkout.rs` run them against each store.

#![allow(
    clippy::missing_panics_doc,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing
)]

pub mod scenarios;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;

use checkout_core::{Money, Product, ProductId, User, UserId, UserRole};
use checkout_server::db::{self, PgStore};
use checkout_server::services::{CartManager, InventoryLedger, OrderWorkflow, StatusPolicy};
use checkout_server::state::AppState;
use checkout_server::store::{Catalog, CommerceStore, MemoryStore, Store, StoreTx};

/// Environment variable naming the `PostgreSQL` test database.
pub const TEST_DATABASE_URL: &str = "CHECKOUT_TEST_DATABASE_URL";

/// Catalog and user setup that the services themselves never perform.
pub trait SeedStore: CommerceStore + Clone {
    /// Register a user.
    fn add_user(&self, user: User) -> impl Future<Output = ()> + Send;

    /// Add or replace a product.
    fn add_product(&self, product: Product) -> impl Future<Output = ()> + Send;

    /// Current stock of a product.
    fn stock(&self, id: ProductId) -> impl Future<Output = i32> + Send;

    /// Change a product's catalog price.
    fn change_price(&self, id: ProductId, price: Money) -> impl Future<Output = ()> + Send;
}

impl SeedStore for MemoryStore {
    async fn add_user(&self, user: User) {
        self.insert_user(user).await;
    }

    async fn add_product(&self, product: Product) {
        self.insert_product(product).await;
    }

    async fn stock(&self, id: ProductId) -> i32 {
        self.stock_of(id).await.expect("product exists")
    }

    async fn change_price(&self, id: ProductId, price: Money) {
        assert!(self.set_price(id, price).await, "product exists");
    }
}

impl SeedStore for PgStore {
    async fn add_user(&self, user: User) {
        self.upsert_user(&user).await.expect("insert user");
    }

    async fn add_product(&self, product: Product) {
        self.upsert_product(&product).await.expect("insert product");
    }

    async fn stock(&self, id: ProductId) -> i32 {
        self.stock_of(id)
            .await
            .expect("read stock")
            .expect("product exists")
    }

    async fn change_price(&self, id: ProductId, price: Money) {
        let mut tx = self.begin().await.expect("begin");
        let mut product = self
            .find_product(&mut tx, id)
            .await
            .expect("read product")
            .expect("product exists");
        tx.commit().await.expect("commit");
        product.price = price;
        self.upsert_product(&product).await.expect("update product");
    }
}

/// Services wired over one store, plus seeding shortcuts.
pub struct Harness<S> {
    pub store: S,
    pub state: AppState<S>,
    pub ledger: InventoryLedger<S>,
}

impl<S: SeedStore> Harness<S> {
    /// Wire services over `store` with the permissive status policy.
    #[must_use]
    pub fn new(store: S) -> Self {
        let state = AppState::new(store.clone(), StatusPolicy::Permissive);
        let ledger = InventoryLedger::new(Arc::new(store.clone()));
        Self {
            store,
            state,
            ledger,
        }
    }

    /// The cart manager.
    #[must_use]
    pub fn carts(&self) -> &CartManager<S> {
        self.state.carts()
    }

    /// The order workflow.
    #[must_use]
    pub fn orders(&self) -> &OrderWorkflow<S> {
        self.state.orders()
    }

    /// Register a fresh user.
    pub async fn user(&self) -> UserId {
        let id = UserId::new_v4();
        self.store
            .add_user(User {
                id,
                email: format!("{id}@example.test"),
                first_name: "Test".to_owned(),
                last_name: "Shopper".to_owned(),
                role: UserRole::User,
                created_at: Utc::now(),
            })
            .await;
        id
    }

    /// Add a fresh active product.
    pub async fn product(&self, name: &str, price: &str, stock: i32) -> ProductId {
        let id = ProductId::new_v4();
        self.store
            .add_product(Product {
                id,
                name: name.to_owned(),
                description: String::new(),
                price: price.parse().expect("valid price"),
                stock,
                is_active: true,
            })
            .await;
        id
    }
}

/// In-memory harness.
#[must_use]
pub fn memory_harness() -> Harness<MemoryStore> {
    Harness::new(MemoryStore::new())
}

/// `PostgreSQL` harness, or `None` when [`TEST_DATABASE_URL`] is unset.
///
/// Applies migrations before returning. Every scenario uses fresh IDs so
/// runs do not interfere with each other.
pub async fn postgres_harness() -> Option<Harness<PgStore>> {
    let url = std::env::var(TEST_DATABASE_URL).ok()?;
    let pool = db::create_pool(&SecretString::from(url), 10)
        .await
        .expect("connect to test database");
    db::migrate(&pool).await.expect("apply migrations");
    Some(Harness::new(PgStore::new(pool)))
}
