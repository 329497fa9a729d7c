//! Database operations for carts and cart lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use checkout_core::{Cart, CartId, CartItem, CartItemId, Product, ProductId, Quantity, UserId};

use super::{PgStore, PgTx, RepositoryError, money_column, quantity_column};
use crate::store::{CartStore, StoreResult};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for cart queries.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Internal row type for cart lines joined with the product name.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price_at_add: Decimal,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CartItemId::from_uuid(row.id),
            cart_id: CartId::from_uuid(row.cart_id),
            product_id: ProductId::from_uuid(row.product_id),
            product_name: row.product_name,
            quantity: quantity_column("cart_item.quantity", row.quantity)?,
            price_at_add: money_column("cart_item.price_at_add", row.price_at_add)?,
        })
    }
}

impl CartRow {
    fn into_cart(self, items: Vec<CartItem>) -> Cart {
        Cart {
            id: CartId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn touch_cart(tx: &mut PgTx, cart_id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE checkout.cart SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(tx.conn())
        .await?;
    Ok(())
}

/// Read a user's cart with its lines, optionally holding the cart row lock.
async fn fetch_cart(
    tx: &mut PgTx,
    user_id: UserId,
    for_update: bool,
) -> Result<Option<Cart>, RepositoryError> {
    let sql = if for_update {
        "SELECT id, user_id, created_at, updated_at FROM checkout.cart WHERE user_id = $1 FOR UPDATE"
    } else {
        "SELECT id, user_id, created_at, updated_at FROM checkout.cart WHERE user_id = $1"
    };
    let Some(cart) = sqlx::query_as::<_, CartRow>(sql)
        .bind(user_id.as_uuid())
        .fetch_optional(tx.conn())
        .await?
    else {
        return Ok(None);
    };

    // Separate statement: after waiting on the lock it sees the lines as
    // committed by the previous holder.
    let items = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT ci.id, ci.cart_id, ci.product_id, p.name AS product_name,
               ci.quantity, ci.price_at_add
        FROM checkout.cart_item ci
        JOIN checkout.product p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        ",
    )
    .bind(cart.id)
    .fetch_all(tx.conn())
    .await?
    .into_iter()
    .map(CartItem::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(cart.into_cart(items)))
}

// =============================================================================
// CartStore
// =============================================================================

impl CartStore for PgStore {
    async fn find_cart(&self, tx: &mut PgTx, user_id: UserId) -> StoreResult<Option<Cart>> {
        fetch_cart(tx, user_id, false).await
    }

    async fn lock_cart(&self, tx: &mut PgTx, user_id: UserId) -> StoreResult<Option<Cart>> {
        fetch_cart(tx, user_id, true).await
    }

    async fn ensure_cart(&self, tx: &mut PgTx, user_id: UserId) -> StoreResult<Cart> {
        // A concurrent first access waits on the unique index here, then
        // finds the row the other transaction committed.
        sqlx::query(
            r"
            INSERT INTO checkout.cart (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(CartId::new_v4().as_uuid())
        .bind(user_id.as_uuid())
        .execute(tx.conn())
        .await?;

        fetch_cart(tx, user_id, true)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert_cart_item(
        &self,
        tx: &mut PgTx,
        cart_id: CartId,
        product: &Product,
        quantity: Quantity,
    ) -> StoreResult<CartItem> {
        let id = CartItemId::new_v4();
        sqlx::query(
            r"
            INSERT INTO checkout.cart_item (id, cart_id, product_id, quantity, price_at_add)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id.as_uuid())
        .bind(cart_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(quantity.get())
        .bind(product.price.amount())
        .execute(tx.conn())
        .await?;

        touch_cart(tx, cart_id.as_uuid()).await?;

        Ok(CartItem {
            id,
            cart_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            price_at_add: product.price,
        })
    }

    async fn update_cart_item_quantity(
        &self,
        tx: &mut PgTx,
        item_id: CartItemId,
        quantity: Quantity,
    ) -> StoreResult<bool> {
        let cart_id = sqlx::query_scalar::<_, Uuid>(
            r"
            UPDATE checkout.cart_item
            SET quantity = $2
            WHERE id = $1
            RETURNING cart_id
            ",
        )
        .bind(item_id.as_uuid())
        .bind(quantity.get())
        .fetch_optional(tx.conn())
        .await?;

        match cart_id {
            Some(cart_id) => {
                touch_cart(tx, cart_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_item(&self, tx: &mut PgTx, item_id: CartItemId) -> StoreResult<bool> {
        let cart_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM checkout.cart_item WHERE id = $1 RETURNING cart_id",
        )
        .bind(item_id.as_uuid())
        .fetch_optional(tx.conn())
        .await?;

        match cart_id {
            Some(cart_id) => {
                touch_cart(tx, cart_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_items(&self, tx: &mut PgTx, cart_id: CartId) -> StoreResult<u64> {
        let removed = sqlx::query("DELETE FROM checkout.cart_item WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(tx.conn())
            .await?
            .rows_affected();

        if removed > 0 {
            touch_cart(tx, cart_id.as_uuid()).await?;
        }
        Ok(removed)
    }
}
