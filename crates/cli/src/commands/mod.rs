//! CLI command implementations.

pub mod migrate;
pub mod orders;
pub mod seed;

use checkout_server::config::ServerConfig;
use checkout_server::db::{self, PgStore};

/// Connect to the checkout database named by the environment.
///
/// # Errors
///
/// Returns an error if configuration is missing or the connection fails.
pub async fn connect() -> Result<(PgStore, ServerConfig), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    tracing::info!("Connecting to checkout database...");
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    Ok((PgStore::new(pool), config))
}
