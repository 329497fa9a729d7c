//! Checkout scenarios against the in-memory store.

use checkout_integration_tests::{memory_harness, scenarios};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_one_buyer() {
    scenarios::last_unit_goes_to_one_buyer(&memory_harness()).await;
}

#[tokio::test]
async fn test_checkout_uses_live_price() {
    scenarios::checkout_uses_live_price(&memory_harness()).await;
}

#[tokio::test]
async fn test_failed_checkout_changes_nothing() {
    scenarios::failed_checkout_changes_nothing(&memory_harness()).await;
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    scenarios::empty_cart_is_rejected(&memory_harness()).await;
}

#[tokio::test]
async fn test_repeated_add_merges_lines() {
    scenarios::repeated_add_merges_lines(&memory_harness()).await;
}

#[tokio::test]
async fn test_clearing_empty_cart_is_idempotent() {
    scenarios::clearing_empty_cart_is_idempotent(&memory_harness()).await;
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    scenarios::cancel_restores_stock(&memory_harness()).await;
}

#[tokio::test]
async fn test_cancel_rejected_after_shipping() {
    scenarios::cancel_rejected_after_shipping(&memory_harness()).await;
}

#[tokio::test]
async fn test_cancel_by_other_user_is_unauthorized() {
    scenarios::cancel_by_other_user_is_unauthorized(&memory_harness()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_restore_once() {
    scenarios::concurrent_cancels_restore_once(&memory_harness()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_never_oversell() {
    scenarios::concurrent_reservations_never_oversell(&memory_harness()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_double_checkout_places_one_order() {
    scenarios::double_checkout_places_one_order(&memory_harness()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_cart_access_race_shares_one_cart() {
    scenarios::first_cart_access_race_shares_one_cart(&memory_harness()).await;
}
