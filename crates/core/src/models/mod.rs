//! Entity shapes shared by the services, the stores and the HTTP layer.
//!
//! Carts and orders are always materialised together with their lines.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem};
pub use product::Product;
pub use user::User;
