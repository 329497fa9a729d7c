//! HTTP middleware stack for the checkout server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (record in span, echo in response)
//!
//! Identity is read per handler through the [`RequireUser`] and
//! [`RequireAdmin`] extractors.

pub mod identity;
pub mod request_id;

pub use identity::{Identity, RequireAdmin, RequireUser};
pub use request_id::request_id_middleware;
