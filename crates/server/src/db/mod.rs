//! Database operations for the checkout `PostgreSQL` store.
//!
//! # Schema: `checkout`
//!
//! ## Tables
//!
//! - `app_user` - Identity anchor for carts and orders
//! - `product` - Catalog rows (`stock >= 0` enforced by a `CHECK`)
//! - `cart` - One per user (unique `user_id`)
//! - `cart_item` - Cart lines, unique per `(cart_id, product_id)`
//! - `customer_order` - Orders with status and frozen total
//! - `order_item` - Order lines with frozen price
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p checkout-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as` + `FromRow` rows) so the
//! crate builds without a live database.

pub mod carts;
pub mod catalog;
pub mod orders;
pub mod users;

use std::time::Duration;

use checkout_core::{Money, Quantity};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::store::{Store, StoreResult, StoreTx};

/// `SQLSTATE` for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// `SQLSTATE` for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";
/// `SQLSTATE` for `check_violation`.
const CHECK_VIOLATION: &str = "23514";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart line).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The transaction lost a race (serialization failure, deadlock, pool
    /// exhaustion) and can be retried as a whole.
    #[error("transaction conflict, retry: {0}")]
    Retryable(String),
}

impl RepositoryError {
    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => {
                    return Self::Retryable(db_err.message().to_owned());
                }
                Some(CHECK_VIOLATION) => return Self::Conflict(db_err.message().to_owned()),
                _ => {}
            }
            if db_err.is_unique_violation() {
                return Self::Conflict(db_err.message().to_owned());
            }
        }
        if matches!(e, sqlx::Error::PoolTimedOut) {
            return Self::Retryable("connection pool timed out".to_owned());
        }
        Self::Database(e)
    }
}

// =============================================================================
// Column Conversions
// =============================================================================

/// Read a `NUMERIC(10, 2)` column as [`Money`].
pub(crate) fn money_column(column: &str, value: Decimal) -> Result<Money, RepositoryError> {
    Money::new(value).map_err(|e| RepositoryError::DataCorruption(format!("{column}: {e}")))
}

/// Read a positive `INTEGER` column as [`Quantity`].
pub(crate) fn quantity_column(column: &str, value: i32) -> Result<Quantity, RepositoryError> {
    Quantity::new(value).map_err(|e| RepositoryError::DataCorruption(format!("{column}: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded migrations against `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if any migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// `PostgreSQL`-backed [`crate::store::CommerceStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open `PostgreSQL` transaction. Rolls back on drop unless committed.
#[derive(Debug)]
pub struct PgTx(Transaction<'static, Postgres>);

impl PgTx {
    /// Connection to run statements on.
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut *self.0
    }
}

impl StoreTx for PgTx {
    async fn commit(self) -> StoreResult<()> {
        self.0.commit().await?;
        Ok(())
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx(tx))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
