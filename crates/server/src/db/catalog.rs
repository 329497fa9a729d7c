//! Database operations for catalog products and stock.

use rust_decimal::Decimal;
use uuid::Uuid;

use checkout_core::{Product, ProductId, Quantity};

use super::{PgStore, PgTx, RepositoryError, money_column};
use crate::store::{Catalog, StockStore, StoreResult};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            price: money_column("product.price", row.price)?,
            stock: row.stock,
            is_active: row.is_active,
        })
    }
}

const SELECT_PRODUCT: &str = r"
    SELECT id, name, description, price, stock, is_active
    FROM checkout.product
    WHERE id = $1
";

const LOCK_PRODUCT: &str = r"
    SELECT id, name, description, price, stock, is_active
    FROM checkout.product
    WHERE id = $1
    FOR UPDATE
";

// =============================================================================
// Catalog
// =============================================================================

impl Catalog for PgStore {
    async fn find_product(&self, tx: &mut PgTx, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(SELECT_PRODUCT)
            .bind(id.as_uuid())
            .fetch_optional(tx.conn())
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn lock_product(&self, tx: &mut PgTx, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(LOCK_PRODUCT)
            .bind(id.as_uuid())
            .fetch_optional(tx.conn())
            .await?;
        row.map(Product::try_from).transpose()
    }
}

// =============================================================================
// Stock
// =============================================================================

impl StockStore for PgStore {
    async fn decrement_stock_if_available(
        &self,
        tx: &mut PgTx,
        id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        // Check and write in one statement; a concurrent decrement waits on the
        // row lock and then re-evaluates `stock >= $2` against the new value.
        let result = sqlx::query(
            r"
            UPDATE checkout.product
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id.as_uuid())
        .bind(quantity.get())
        .execute(tx.conn())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_stock(
        &self,
        tx: &mut PgTx,
        id: ProductId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE checkout.product
            SET stock = stock + $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(quantity.get())
        .execute(tx.conn())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Seeding
// =============================================================================

impl PgStore {
    /// Insert a product, or overwrite every column of an existing one.
    ///
    /// Used by the CLI seeder and by tests; the checkout flow never writes
    /// catalog rows other than stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database operation fails.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO checkout.product (id, name, description, price, stock, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active,
                updated_at = now()
            ",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.stock)
        .bind(product.is_active)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Current stock of a product, outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database operation fails.
    pub async fn stock_of(&self, id: ProductId) -> Result<Option<i32>, RepositoryError> {
        let stock = sqlx::query_scalar::<_, i32>("SELECT stock FROM checkout.product WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.pool())
            .await?;
        Ok(stock)
    }
}
