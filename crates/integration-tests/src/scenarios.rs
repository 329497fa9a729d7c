//! Checkout properties, written once and run against every backend.
//!
//! Each scenario creates its own users and products, so scenarios can share
//! a database and run in parallel.

use checkout_core::{Money, OrderStatus, Quantity};
use checkout_server::services::CheckoutError;
use checkout_server::store::{Store, StoreTx};

use crate::{Harness, SeedStore};

fn qty(n: i32) -> Quantity {
    Quantity::new(n).expect("positive quantity")
}

// =============================================================================
// Checkout
// =============================================================================

/// Two shoppers race for the last unit: one order, one `InsufficientStock`.
pub async fn last_unit_goes_to_one_buyer<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Last One", "15.00", 1).await;
    let alice = h.user().await;
    let bob = h.user().await;
    h.carts().add_item(alice, product, qty(1)).await.expect("add");
    h.carts().add_item(bob, product, qty(1)).await.expect("add");

    let spawn_checkout = |user| {
        let orders = h.orders().clone();
        tokio::spawn(async move { orders.create_order(user, "1 Race Lane").await })
    };
    let first = spawn_checkout(alice);
    let second = spawn_checkout(bob);
    let results = [
        first.await.expect("join"),
        second.await.expect("join"),
    ];

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1, "exactly one checkout succeeds: {results:?}");
    let rejected = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one failure");
    assert!(
        matches!(
            rejected,
            CheckoutError::InsufficientStock { available: 0, .. }
        ),
        "{rejected:?}"
    );
    assert_eq!(h.store.stock(product).await, 0);
}

/// The order charges the catalog price at checkout, not the price at add.
pub async fn checkout_uses_live_price<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Teapot", "10.00", 5).await;
    let user = h.user().await;
    let cart = h.carts().add_item(user, product, qty(2)).await.expect("add");
    assert_eq!(cart.total(), Money::from_cents(2000));

    h.store.change_price(product, Money::from_cents(1200)).await;
    let order = h
        .orders()
        .create_order(user, "  12 Kettle Street  ")
        .await
        .expect("checkout");

    assert_eq!(order.total_amount.to_string(), "24.00");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shipping_address, "12 Kettle Street");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].price_at_order, Money::from_cents(1200));
    assert_eq!(h.store.stock(product).await, 3);

    let cart = h.carts().get_or_create_cart(user).await.expect("cart");
    assert!(cart.is_empty());
    assert_eq!(h.orders().find_all(user).await.expect("orders").len(), 1);
}

/// Two checkouts of the same cart place one order; the other finds it empty.
pub async fn double_checkout_places_one_order<S: SeedStore>(h: &Harness<S>) {
    for _ in 0..5 {
        let product = h.product("Double Click", "9.00", 100).await;
        let user = h.user().await;
        h.carts().add_item(user, product, qty(1)).await.expect("add");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let orders = h.orders().clone();
                tokio::spawn(async move { orders.create_order(user, "7 Twin Tabs").await })
            })
            .collect();
        let mut placed = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => placed += 1,
                Err(CheckoutError::EmptyCart) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(placed, 1);
        assert_eq!(h.store.stock(product).await, 99);
        assert_eq!(h.orders().find_all(user).await.expect("orders").len(), 1);
    }
}

/// A line that cannot be covered fails the whole checkout with no writes.
pub async fn failed_checkout_changes_nothing<S: SeedStore>(h: &Harness<S>) {
    let plenty = h.product("Plenty", "2.00", 10).await;
    let scarce = h.product("Scarce", "3.00", 2).await;
    let user = h.user().await;
    let rival = h.user().await;
    h.carts().add_item(user, plenty, qty(3)).await.expect("add");
    h.carts().add_item(user, scarce, qty(2)).await.expect("add");

    // Someone else buys one of the scarce units first.
    h.carts().add_item(rival, scarce, qty(1)).await.expect("add");
    h.orders()
        .create_order(rival, "9 Elsewhere")
        .await
        .expect("rival checkout");

    let err = h
        .orders()
        .create_order(user, "1 Main Street")
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            CheckoutError::InsufficientStock {
                product_id,
                requested: 2,
                available: 1,
            } if product_id == scarce
        ),
        "{err:?}"
    );

    assert_eq!(h.store.stock(plenty).await, 10);
    assert_eq!(h.store.stock(scarce).await, 1);
    assert!(h.orders().find_all(user).await.expect("orders").is_empty());
    let cart = h.carts().get_or_create_cart(user).await.expect("cart");
    assert_eq!(cart.items.len(), 2);
}

/// An empty cart cannot be checked out.
pub async fn empty_cart_is_rejected<S: SeedStore>(h: &Harness<S>) {
    let user = h.user().await;
    let err = h
        .orders()
        .create_order(user, "1 Main Street")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart), "{err:?}");

    // Materialised but still empty.
    h.carts().get_or_create_cart(user).await.expect("cart");
    let err = h
        .orders()
        .create_order(user, "1 Main Street")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart), "{err:?}");
}

// =============================================================================
// Cart
// =============================================================================

/// Adding the same product twice yields one merged line.
pub async fn repeated_add_merges_lines<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Mug", "4.50", 10).await;
    let user = h.user().await;
    h.carts().add_item(user, product, qty(2)).await.expect("add");
    let cart = h.carts().add_item(user, product, qty(3)).await.expect("add");

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, qty(5));
    assert_eq!(cart.items[0].product_name, "Mug");
    assert_eq!(cart.total().to_string(), "22.50");
    assert_eq!(
        h.carts().total(user).await.expect("total"),
        Money::from_cents(2250)
    );
}

/// Racing first requests for a new user share one lazily created cart.
pub async fn first_cart_access_race_shares_one_cart<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Welcome Gift", "3.00", 100).await;
    for _ in 0..5 {
        let user = h.user().await;
        let adder = {
            let carts = h.carts().clone();
            tokio::spawn(async move { carts.add_item(user, product, qty(1)).await })
        };
        let viewer = {
            let carts = h.carts().clone();
            tokio::spawn(async move { carts.get_or_create_cart(user).await })
        };

        let added = adder.await.expect("join").expect("add item");
        let viewed = viewer.await.expect("join").expect("get cart");
        assert_eq!(added.id, viewed.id);
        assert_eq!(added.items.len(), 1);

        let cart = h.carts().get_or_create_cart(user).await.expect("cart");
        assert_eq!(cart.id, added.id);
        assert_eq!(cart.items.len(), 1);
    }
}

/// Clearing an already empty cart succeeds and leaves it empty.
pub async fn clearing_empty_cart_is_idempotent<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Spoon", "1.00", 3).await;
    let user = h.user().await;
    h.carts().add_item(user, product, qty(1)).await.expect("add");

    let first = h.carts().clear(user).await.expect("clear");
    let second = h.carts().clear(user).await.expect("clear again");
    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(first.id, second.id);
    assert_eq!(h.store.stock(product).await, 3);
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cancelling restores every line's stock exactly once.
pub async fn cancel_restores_stock<S: SeedStore>(h: &Harness<S>) {
    let a = h.product("A", "5.00", 3).await;
    let b = h.product("B", "7.00", 2).await;
    let user = h.user().await;
    h.carts().add_item(user, a, qty(2)).await.expect("add");
    h.carts().add_item(user, b, qty(1)).await.expect("add");
    let order = h
        .orders()
        .create_order(user, "3 Return Road")
        .await
        .expect("checkout");
    assert_eq!(h.store.stock(a).await, 1);
    assert_eq!(h.store.stock(b).await, 1);

    let cancelled = h
        .orders()
        .cancel_order(user, order.id)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.store.stock(a).await, 3);
    assert_eq!(h.store.stock(b).await, 2);

    let err = h.orders().cancel_order(user, order.id).await.unwrap_err();
    assert!(
        matches!(
            err,
            CheckoutError::InvalidState {
                status: OrderStatus::Cancelled,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(h.store.stock(a).await, 3);
}

/// Shipped and delivered orders cannot be cancelled.
pub async fn cancel_rejected_after_shipping<S: SeedStore>(h: &Harness<S>) {
    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        let product = h.product("Parcel", "8.00", 4).await;
        let user = h.user().await;
        h.carts().add_item(user, product, qty(1)).await.expect("add");
        let order = h
            .orders()
            .create_order(user, "4 Post Lane")
            .await
            .expect("checkout");
        h.orders()
            .update_status(order.id, status)
            .await
            .expect("status");

        let err = h.orders().cancel_order(user, order.id).await.unwrap_err();
        assert!(
            matches!(err, CheckoutError::InvalidState { status: s, .. } if s == status),
            "{err:?}"
        );
        assert_eq!(h.store.stock(product).await, 3);
        let stored = h.orders().find_one(order.id).await.expect("order");
        assert_eq!(stored.status, status);
    }
}

/// Only the owner may cancel an order.
pub async fn cancel_by_other_user_is_unauthorized<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Lamp", "30.00", 2).await;
    let owner = h.user().await;
    let stranger = h.user().await;
    h.carts().add_item(owner, product, qty(1)).await.expect("add");
    let order = h
        .orders()
        .create_order(owner, "5 Light Street")
        .await
        .expect("checkout");

    let err = h
        .orders()
        .cancel_order(stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Unauthorized), "{err:?}");
    let stored = h.orders().find_one(order.id).await.expect("order");
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(h.store.stock(product).await, 1);
}

/// Racing cancels of one order restore stock once.
pub async fn concurrent_cancels_restore_once<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Vase", "12.00", 5).await;
    let user = h.user().await;
    h.carts().add_item(user, product, qty(2)).await.expect("add");
    let order = h
        .orders()
        .create_order(user, "6 Fragile Way")
        .await
        .expect("checkout");

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let orders = h.orders().clone();
            let order_id = order.id;
            tokio::spawn(async move { orders.cancel_order(user, order_id).await })
        })
        .collect();
    let mut succeeded = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => succeeded += 1,
            Err(CheckoutError::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.store.stock(product).await, 5);
}

// =============================================================================
// Inventory
// =============================================================================

/// Concurrent reservations never drive stock below zero.
pub async fn concurrent_reservations_never_oversell<S: SeedStore>(h: &Harness<S>) {
    let product = h.product("Widget", "1.00", 5).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = h.store.clone();
            let ledger = h.ledger.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await?;
                ledger.reserve(&mut tx, product, qty(1)).await?;
                tx.commit().await?;
                Ok::<_, CheckoutError>(())
            })
        })
        .collect();

    let mut reserved = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(()) => reserved += 1,
            Err(CheckoutError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(reserved, 5);
    assert_eq!(h.store.stock(product).await, 0);
}
