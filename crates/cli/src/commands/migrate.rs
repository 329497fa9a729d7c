//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! checkout-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded into the
//! server library at build time.

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the connection fails or a migration cannot be applied.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (store, _config) = super::connect().await?;

    tracing::info!("Running checkout migrations...");
    checkout_server::db::migrate(store.pool()).await?;

    tracing::info!("Checkout migrations complete!");
    Ok(())
}
