//! Checkout services.
//!
//! - [`InventoryLedger`] - conditional stock writes
//! - [`CartManager`] - per-user cart
//! - [`OrderWorkflow`] - checkout, status changes and cancellation
//!
//! All three are generic over the storage backend and are composed
//! explicitly in [`crate::state::AppState`].

pub mod cart;
pub mod error;
pub mod inventory;
pub mod orders;

pub use cart::CartManager;
pub use error::{CheckoutError, CheckoutResult};
pub use inventory::InventoryLedger;
pub use orders::{OrderWorkflow, StatusPolicy};
