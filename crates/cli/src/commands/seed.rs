//! Seed the database with users and products from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! users:
//!   - id: 7f9c0c1e-0000-4000-8000-000000000001
//!     email: admin@example.com
//!     first_name: Ada
//!     last_name: Admin
//!     role: admin
//! products:
//!   - id: 0b5e2d4a-0000-4000-8000-000000000101
//!     name: Mango
//!     description: Whole, ripe
//!     price: "4.50"
//!     stock: 40
//! ```
//!
//! IDs are required so re-running the seed updates rows in place.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use checkout_core::{Money, Product, ProductId, User, UserId, UserRole};

/// Errors in a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file is not valid YAML for the seed format.
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A product declares negative stock.
    #[error("product {0} has negative stock")]
    NegativeStock(String),

    /// A user has no usable email.
    #[error("user {0} has an invalid email")]
    InvalidEmail(String),
}

/// Parsed seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// One user entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: UserRole,
}

/// One product entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl SeedFile {
    /// Parse and validate seed YAML.
    ///
    /// # Errors
    ///
    /// Returns `SeedError` if the YAML is malformed or an entry is invalid.
    pub fn parse(content: &str) -> Result<Self, SeedError> {
        let file: Self = serde_yaml::from_str(content)?;
        for user in &file.users {
            if !user.email.contains('@') {
                return Err(SeedError::InvalidEmail(user.id.to_string()));
            }
        }
        for product in &file.products {
            if product.stock < 0 {
                return Err(SeedError::NegativeStock(product.name.clone()));
            }
        }
        Ok(file)
    }
}

impl From<SeedUser> for User {
    fn from(seed: SeedUser) -> Self {
        Self {
            id: seed.id,
            email: seed.email,
            first_name: seed.first_name,
            last_name: seed.last_name,
            role: seed.role,
            created_at: Utc::now(),
        }
    }
}

impl From<SeedProduct> for Product {
    fn from(seed: SeedProduct) -> Self {
        Self {
            id: seed.id,
            name: seed.name,
            description: seed.description,
            price: seed.price,
            stock: seed.stock,
            is_active: seed.is_active,
        }
    }
}

/// Seed users and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database
/// write fails.
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    tracing::info!(path = %file_path, "Loading seed data from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed = SeedFile::parse(&content)?;
    tracing::info!(
        users = seed.users.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let (store, _config) = super::connect().await?;

    let (mut users, mut products) = (0_usize, 0_usize);
    for user in seed.users {
        store.upsert_user(&User::from(user)).await?;
        users += 1;
    }
    for product in seed.products {
        store.upsert_product(&Product::from(product)).await?;
        products += 1;
    }

    tracing::info!("Seeding complete!");
    tracing::info!("  Users upserted: {users}");
    tracing::info!("  Products upserted: {products}");
    Ok(())
}
