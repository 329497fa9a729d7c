//! Core types for the checkout backend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod quantity;
pub mod role;
pub mod status;

pub use id::*;
pub use money::{Money, MoneyError};
pub use quantity::{Quantity, QuantityError};
pub use role::UserRole;
pub use status::{OrderStatus, ParseStatusError};
