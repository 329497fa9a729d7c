//! Inventory ledger: the only writer of product stock.
//!
//! Every stock change is a conditional write executed inside the caller's
//! transaction, so it commits or rolls back together with the rest of the
//! operation.

use std::sync::Arc;

use tracing::instrument;

use checkout_core::{Product, ProductId, Quantity};

use super::error::{CheckoutError, CheckoutResult};
use crate::store::{Catalog, StockStore};

/// Stock reservation and release primitives.
pub struct InventoryLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for InventoryLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryLedger").finish_non_exhaustive()
    }
}

/// Fail with `InsufficientStock` unless `product` covers `requested` units.
///
/// Advisory when `product` was read without a lock.
///
/// # Errors
///
/// Returns `CheckoutError::InsufficientStock` if stock is below `requested`.
pub fn ensure_covers(product: &Product, requested: i64) -> CheckoutResult<()> {
    if i64::from(product.stock) < requested {
        return Err(CheckoutError::InsufficientStock {
            product_id: product.id,
            requested,
            available: product.stock,
        });
    }
    Ok(())
}

impl<S: Catalog + StockStore> InventoryLedger<S> {
    /// Create a ledger over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Decrement stock by `quantity`, failing if stock is insufficient.
    ///
    /// The check and the write are one conditional update; two concurrent
    /// reservations can never both pass on the same units.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::InsufficientStock` if stock is below `quantity`
    /// - `CheckoutError::ProductNotFound` if the product does not exist
    #[instrument(skip(self, tx))]
    pub async fn reserve(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: Quantity,
    ) -> CheckoutResult<()> {
        if self
            .store
            .decrement_stock_if_available(tx, product_id, quantity)
            .await?
        {
            return Ok(());
        }

        // The write did not apply; read back why.
        let product = self
            .store
            .find_product(tx, product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound)?;
        tracing::debug!(available = product.stock, "reservation rejected");
        Err(CheckoutError::InsufficientStock {
            product_id,
            requested: i64::from(quantity.get()),
            available: product.stock,
        })
    }

    /// Increment stock by `quantity`. There is no upper bound.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if the product does not exist.
    #[instrument(skip(self, tx))]
    pub async fn release(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: Quantity,
    ) -> CheckoutResult<()> {
        if self.store.increment_stock(tx, product_id, quantity).await? {
            Ok(())
        } else {
            Err(CheckoutError::ProductNotFound)
        }
    }

    /// Whether current stock covers `quantity`, without reserving anything.
    ///
    /// A `true` answer does not guarantee a later [`Self::reserve`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductNotFound` if the product does not exist.
    pub async fn check_available(
        &self,
        tx: &mut S::Tx,
        product_id: ProductId,
        quantity: Quantity,
    ) -> CheckoutResult<bool> {
        let product = self
            .store
            .find_product(tx, product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound)?;
        Ok(product.has_stock_for(quantity))
    }
}

#[cfg(test)]
mod tests {
    use checkout_core::Money;

    use super::*;
    use crate::store::{MemoryStore, Store, StoreTx};

    fn product(stock: i32) -> Product {
        Product {
            id: ProductId::new_v4(),
            name: "Mango".to_owned(),
            description: String::new(),
            price: Money::from_cents(300),
            stock,
            is_active: true,
        }
    }

    fn qty(n: i32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn ledger_with(p: &Product) -> (Arc<MemoryStore>, InventoryLedger<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_product(p.clone()).await;
        (Arc::clone(&store), InventoryLedger::new(store))
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let p = product(5);
        let (store, ledger) = ledger_with(&p).await;

        let mut tx = store.begin().await.unwrap();
        ledger.reserve(&mut tx, p.id, qty(2)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(3));
    }

    #[tokio::test]
    async fn test_reserve_rejects_insufficient_stock() {
        let p = product(1);
        let (store, ledger) = ledger_with(&p).await;

        let mut tx = store.begin().await.unwrap();
        let err = ledger.reserve(&mut tx, p.id, qty(2)).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(1));
    }

    #[tokio::test]
    async fn test_reserve_and_release_unknown_product() {
        let p = product(1);
        let (store, ledger) = ledger_with(&p).await;
        let mut tx = store.begin().await.unwrap();
        let missing = ProductId::new_v4();

        assert!(matches!(
            ledger.reserve(&mut tx, missing, qty(1)).await,
            Err(CheckoutError::ProductNotFound)
        ));
        assert!(matches!(
            ledger.release(&mut tx, missing, qty(1)).await,
            Err(CheckoutError::ProductNotFound)
        ));
    }

    #[tokio::test]
    async fn test_release_has_no_upper_bound() {
        let p = product(2);
        let (store, ledger) = ledger_with(&p).await;

        let mut tx = store.begin().await.unwrap();
        ledger.release(&mut tx, p.id, qty(10)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(12));
    }

    #[tokio::test]
    async fn test_check_available_is_read_only() {
        let p = product(3);
        let (store, ledger) = ledger_with(&p).await;

        let mut tx = store.begin().await.unwrap();
        assert!(ledger.check_available(&mut tx, p.id, qty(3)).await.unwrap());
        assert!(!ledger.check_available(&mut tx, p.id, qty(4)).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(p.id).await, Some(3));
    }

    #[test]
    fn test_ensure_covers() {
        let p = product(4);
        assert!(ensure_covers(&p, 4).is_ok());
        assert!(matches!(
            ensure_covers(&p, 5),
            Err(CheckoutError::InsufficientStock { available: 4, .. })
        ));
    }
}
