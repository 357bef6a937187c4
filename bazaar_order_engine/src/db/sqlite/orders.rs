//! Low-level order queries. None of these are atomic on their own. Embed them in a transaction and pass `&mut *tx`
//! as the connection when you need atomicity.
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, StatusUpdate},
    traits::OrderFlowError,
};

/// Inserts the order header and all of its line items using the given connection.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let (subtotal, total) = order.subtotal().zip(order.total()).ok_or(OrderFlowError::AmountOutOfRange)?;
    let header: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                buyer_id,
                subtotal,
                delivery_fee,
                total,
                currency,
                shipping_name,
                shipping_phone,
                shipping_address,
                shipping_city,
                shipping_state,
                shipping_country
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(order.buyer_id)
    .bind(subtotal)
    .bind(order.delivery_fee)
    .bind(total)
    .bind(&order.currency)
    .bind(&order.shipping.name)
    .bind(&order.shipping.phone)
    .bind(&order.shipping.address)
    .bind(&order.shipping.city)
    .bind(&order.shipping.state)
    .bind(&order.shipping.country)
    .fetch_one(&mut *conn)
    .await?;
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        items.push(insert_order_item(header.id, item, conn).await?);
    }
    trace!("🗃️ Order #{} inserted with {} items", header.id, items.len());
    Ok(header.with_items(items))
}

async fn insert_order_item(
    order_id: i64,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderFlowError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, seller_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.seller_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, OrderFlowError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

async fn attach_items(orders: Vec<Order>, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderFlowError> {
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let items = fetch_items(order.id, conn).await?;
        result.push(order.with_items(items));
    }
    Ok(result)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, OrderFlowError> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match order {
        Some(order) => {
            let items = fetch_items(order.id, conn).await?;
            Ok(Some(order.with_items(items)))
        },
        None => Ok(None),
    }
}

/// The order that `reference` was issued for, whether or not that session went on to pay for it.
pub async fn fetch_order_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderFlowError> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            SELECT orders.* FROM orders
            JOIN payment_sessions ON payment_sessions.target_kind = 'order' AND payment_sessions.target_id = orders.id
            WHERE payment_sessions.reference = $1;
        "#,
    )
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;
    match order {
        Some(order) => {
            let items = fetch_items(order.id, conn).await?;
            Ok(Some(order.with_items(items)))
        },
        None => Ok(None),
    }
}

pub async fn fetch_orders_for_buyer(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderFlowError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE buyer_id = $1 ORDER BY id DESC")
        .bind(buyer_id)
        .fetch_all(&mut *conn)
        .await?;
    attach_items(orders, conn).await
}

pub async fn fetch_orders_for_seller(
    seller_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, OrderFlowError> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE id IN (SELECT order_id FROM order_items WHERE seller_id = $1)
            ORDER BY id DESC
        "#,
    )
    .bind(seller_id)
    .fetch_all(&mut *conn)
    .await?;
    attach_items(orders, conn).await
}

/// Applies `update` only if the order is still in `update.from`. Returns the updated order header (without items), or
/// `None` if the order was not in the expected state.
pub async fn update_order_status(
    order_id: i64,
    update: &StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderFlowError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                tracking_number = COALESCE($2, tracking_number),
                cancellation_reason = COALESCE($3, cancellation_reason),
                delivered_at = COALESCE($4, delivered_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(update.to)
    .bind(&update.tracking_number)
    .bind(&update.cancellation_reason)
    .bind(update.delivered_at)
    .bind(order_id)
    .bind(update.from)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
