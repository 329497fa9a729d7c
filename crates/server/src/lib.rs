//! Checkout server library.
//!
//! Cart management, inventory reservation and the order workflow, exposed
//! as a library so the binary, the CLI and the integration tests share one
//! implementation.
//!
//! # Layers
//!
//! - [`store`] - transaction-scoped storage traits and the in-memory backend
//! - [`db`] - `PostgreSQL` backend
//! - [`services`] - `InventoryLedger`, `CartManager`, `OrderWorkflow`
//! - [`routes`] - thin JSON HTTP surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
