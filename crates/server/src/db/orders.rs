//! Database operations for orders and order lines.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use checkout_core::{
    Money, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product, ProductId, Quantity,
    UserId,
};

use super::{PgStore, PgTx, RepositoryError, money_column, quantity_column};
use crate::store::{OrderStore, StoreResult};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: Decimal,
    status: String,
    shipping_address: String,
    created_at: DateTime<Utc>,
}

/// Internal row type for order lines joined with the product name.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price_at_order: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderItemId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            product_id: ProductId::from_uuid(row.product_id),
            product_name: row.product_name,
            quantity: quantity_column("order_item.quantity", row.quantity)?,
            price_at_order: money_column("order_item.price_at_order", row.price_at_order)?,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(format!("customer_order.status: {e}")))?;
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            items,
            total_amount: money_column("customer_order.total_amount", self.total_amount)?,
            status,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, total_amount, status, shipping_address, created_at";

/// Load the lines of every order in `rows` with one query and attach them.
async fn with_items(tx: &mut PgTx, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name,
               oi.quantity, oi.price_at_order
        FROM checkout.order_item oi
        JOIN checkout.product p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.order_id, oi.id
        ",
    )
    .bind(&ids)
    .fetch_all(tx.conn())
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::with_capacity(rows.len());
    for row in item_rows {
        let order_id = row.order_id;
        by_order
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(items)
        })
        .collect()
}

async fn fetch_order(
    tx: &mut PgTx,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, RepositoryError> {
    let sql = if for_update {
        format!("SELECT {ORDER_COLUMNS} FROM checkout.customer_order WHERE id = $1 FOR UPDATE")
    } else {
        format!("SELECT {ORDER_COLUMNS} FROM checkout.customer_order WHERE id = $1")
    };
    let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(tx.conn())
        .await?
    else {
        return Ok(None);
    };

    Ok(with_items(tx, vec![row]).await?.pop())
}

// =============================================================================
// OrderStore
// =============================================================================

impl OrderStore for PgStore {
    async fn insert_order(
        &self,
        tx: &mut PgTx,
        user_id: UserId,
        total_amount: Money,
        shipping_address: &str,
    ) -> StoreResult<Order> {
        let sql = format!(
            r"
            INSERT INTO checkout.customer_order
                (id, user_id, total_amount, status, shipping_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(OrderId::new_v4().as_uuid())
            .bind(user_id.as_uuid())
            .bind(total_amount.amount())
            .bind(OrderStatus::Pending.as_str())
            .bind(shipping_address)
            .fetch_one(tx.conn())
            .await?;

        row.into_order(Vec::new())
    }

    async fn insert_order_item(
        &self,
        tx: &mut PgTx,
        order_id: OrderId,
        product: &Product,
        quantity: Quantity,
    ) -> StoreResult<OrderItem> {
        let id = OrderItemId::new_v4();
        sqlx::query(
            r"
            INSERT INTO checkout.order_item (id, order_id, product_id, quantity, price_at_order)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(quantity.get())
        .bind(product.price.amount())
        .execute(tx.conn())
        .await?;

        Ok(OrderItem {
            id,
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            price_at_order: product.price,
        })
    }

    async fn find_order(&self, tx: &mut PgTx, id: OrderId) -> StoreResult<Option<Order>> {
        fetch_order(tx, id, false).await
    }

    async fn lock_order(&self, tx: &mut PgTx, id: OrderId) -> StoreResult<Option<Order>> {
        fetch_order(tx, id, true).await
    }

    async fn list_orders_for_user(
        &self,
        tx: &mut PgTx,
        user_id: UserId,
    ) -> StoreResult<Vec<Order>> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM checkout.customer_order
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(tx.conn())
            .await?;

        with_items(tx, rows).await
    }

    async fn list_all_orders(&self, tx: &mut PgTx) -> StoreResult<Vec<Order>> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM checkout.customer_order
            ORDER BY created_at DESC, id
            "
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(tx.conn())
            .await?;

        with_items(tx, rows).await
    }

    async fn update_order_status(
        &self,
        tx: &mut PgTx,
        id: OrderId,
        status: OrderStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE checkout.customer_order SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(tx.conn())
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
