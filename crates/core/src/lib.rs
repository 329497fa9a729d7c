//! Checkout Core - Shared domain types.
//!
//! This crate provides the types used across all checkout components:
//! - `server` - Cart, inventory and order services plus the HTTP surface
//! - `cli` - Command-line tools for migrations, seeding and order administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP. The order status state machine and money arithmetic live
//! here so every component agrees on them.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, quantities, statuses and roles
//! - [`models`] - Entity shapes: products, users, carts and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
