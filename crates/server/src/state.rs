//! Application state shared across handlers.

use std::sync::Arc;

use crate::services::{CartManager, InventoryLedger, OrderWorkflow, StatusPolicy};
use crate::store::CommerceStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The services are composed
/// explicitly here from one storage backend.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: Arc<S>,
    carts: CartManager<S>,
    orders: OrderWorkflow<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CommerceStore> AppState<S> {
    /// Wire the services over `store`.
    #[must_use]
    pub fn new(store: S, policy: StatusPolicy) -> Self {
        let store = Arc::new(store);
        let carts = CartManager::new(Arc::clone(&store));
        let ledger = InventoryLedger::new(Arc::clone(&store));
        let orders =
            OrderWorkflow::new(Arc::clone(&store), carts.clone(), ledger).with_policy(policy);

        Self {
            inner: Arc::new(AppStateInner {
                store,
                carts,
                orders,
            }),
        }
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the cart manager.
    #[must_use]
    pub fn carts(&self) -> &CartManager<S> {
        &self.inner.carts
    }

    /// Get a reference to the order workflow.
    #[must_use]
    pub fn orders(&self) -> &OrderWorkflow<S> {
        &self.inner.orders
    }
}
