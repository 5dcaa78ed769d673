use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId};
use domain::{
    EmailMessage, Money, Notification, Order, OrderDetails, OrderDraft, OrderLine, OrderStatus,
    PaymentRecord, Product, ProductDraft, Reservation, StatusPolicy,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::ledger::{self, LockedProduct};
use crate::{
    CatalogStore, NotificationOutbox, OrderStore, OutboxMessage, Result, StatusChange, StoreError,
    StoreStats,
};

const PRODUCT_COLUMNS: &str = "id, name, brand, category, regular_price, discount_price, stock, \
     image_url, description";

const ORDER_COLUMNS: &str = "id, user_email, customer_name, user_phone, shipping_address, \
     total_amount, payment_method, status, created_at";

const OUTBOX_COLUMNS: &str = "id, order_id, kind, recipient, subject, body_html, status, \
     attempts, last_error, next_attempt_at, created_at, sent_at";

/// PostgreSQL-backed store.
///
/// Checkouts lock the product rows they touch with `SELECT ... FOR UPDATE`
/// in ascending id order, so concurrent checkouts on overlapping products
/// serialize without deadlocking. Debits are additionally guarded by
/// `stock >= quantity` in the `UPDATE` itself.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            brand: row.try_get("brand")?,
            category: row.try_get("category")?,
            regular_price: row.try_get::<Option<i64>, _>("regular_price")?.map(Money::new),
            discount_price: Money::new(row.try_get("discount_price")?),
            stock: to_u32(row.try_get("stock")?, "products.stock")?,
            image_url: row.try_get("image_url")?,
            description: row.try_get("description")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            customer_email: row.try_get("user_email")?,
            customer_name: row.try_get("customer_name")?,
            phone: row.try_get("user_phone")?,
            shipping_address: row.try_get("shipping_address")?,
            total_amount: Money::new(row.try_get("total_amount")?),
            payment_method: row.try_get("payment_method")?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: row.try_get("id")?,
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: to_u32(row.try_get("quantity")?, "order_items.quantity")?,
            price: Money::new(row.try_get("price")?),
            image_url: row.try_get("image_url")?,
        })
    }

    fn row_to_outbox(row: &PgRow) -> Result<OutboxMessage> {
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        let attempts: i32 = row.try_get("attempts")?;
        Ok(OutboxMessage {
            id: NotificationId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            kind: kind.parse().map_err(StoreError::CorruptRow)?,
            message: EmailMessage {
                to: row.try_get("recipient")?,
                subject: row.try_get("subject")?,
                html: row.try_get("body_html")?,
            },
            status: status.parse().map_err(StoreError::CorruptRow)?,
            attempts: u32::try_from(attempts)
                .map_err(|_| StoreError::CorruptRow(format!("negative attempts: {attempts}")))?,
            last_error: row.try_get("last_error")?,
            next_attempt_at: row.try_get("next_attempt_at")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
        })
    }

    async fn lock_order(conn: &mut PgConnection, order_id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;
        Self::row_to_order(&row)
    }

    async fn order_lines(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id, oi.product_name, oi.quantity, oi.price,
                   p.image_url
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(Self::row_to_line).collect()
    }

    async fn enqueue(conn: &mut PgConnection, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_outbox (order_id, kind, recipient, subject, body_html)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.order_id.as_i64())
        .bind(notification.kind.as_str())
        .bind(&notification.message.to)
        .bind(&notification.message.subject)
        .bind(&notification.message.html)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Restocks, flips the status and enqueues the notice on an open
    /// transaction whose order row is already locked.
    async fn cancel_locked(conn: &mut PgConnection, mut order: Order) -> Result<Order> {
        order.status.ensure_cancellable(order.id)?;

        let rows = sqlx::query("SELECT product_id, quantity FROM order_items WHERE order_id = $1")
            .bind(order.id.as_i64())
            .fetch_all(&mut *conn)
            .await?;
        let mut reservation = Reservation::new();
        for row in &rows {
            reservation.add(
                ProductId::new(row.try_get("product_id")?),
                to_u32(row.try_get("quantity")?, "order_items.quantity")?,
            );
        }

        for (product_id, quantity) in reservation.iter() {
            let result = sqlx::query("UPDATE products SET stock = stock + $1 WHERE id = $2")
                .bind(i64::from(quantity))
                .bind(product_id.as_i64())
                .execute(&mut *conn)
                .await?;
            if result.rows_affected() == 0 {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %product_id,
                    "product no longer exists, skipping restock"
                );
            }
        }

        sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(OrderStatus::Cancelled.as_str())
            .bind(order.id.as_i64())
            .execute(&mut *conn)
            .await?;
        order.status = OrderStatus::Cancelled;

        Self::enqueue(conn, &Notification::cancellation_notice(&order)).await?;
        Ok(order)
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::CorruptRow(format!("{column} = {value}")))
}

/// Escapes LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products
                (name, brand, category, regular_price, discount_price, stock, image_url, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.brand)
        .bind(&draft.category)
        .bind(draft.regular_price.map(|p| p.amount()))
        .bind(draft.discount_price.amount())
        .bind(i64::from(draft.stock))
        .bind(&draft.image_url)
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(draft.into_product(ProductId::new(id)))
    }

    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, brand = $2, category = $3, regular_price = $4,
                discount_price = $5, stock = $6, image_url = $7, description = $8
            WHERE id = $9
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.brand)
        .bind(&draft.category)
        .bind(draft.regular_price.map(|p| p.amount()))
        .bind(draft.discount_price.amount())
        .bind(i64::from(draft.stock))
        .bind(&draft.image_url)
        .bind(&draft.description)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(draft.into_product(id))
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>> {
        let rows = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE name ILIKE $1 ORDER BY id DESC"
                ))
                .bind(like_pattern(term))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<OrderDetails> {
        let reservation = draft.reservation();
        let ids: Vec<i64> = reservation
            .product_ids()
            .into_iter()
            .map(ProductId::as_i64)
            .collect();

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, stock, discount_price, image_url
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut locked = BTreeMap::new();
        for row in &rows {
            let id = ProductId::new(row.try_get("id")?);
            locked.insert(
                id,
                LockedProduct {
                    id,
                    name: row.try_get("name")?,
                    stock: to_u32(row.try_get("stock")?, "products.stock")?,
                    price: Money::new(row.try_get("discount_price")?),
                    image_url: row.try_get("image_url")?,
                },
            );
        }

        // Drops the transaction (and its locks) on rejection.
        let checkout = ledger::price_checkout(draft, &locked)?;

        let header = sqlx::query(
            r#"
            INSERT INTO orders
                (user_email, customer_name, user_phone, shipping_address, total_amount,
                 payment_method, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(&draft.customer_email)
        .bind(&draft.customer_name)
        .bind(&draft.phone)
        .bind(&draft.shipping_address)
        .bind(checkout.totals.total.amount())
        .bind(&draft.payment_method)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let order = Order {
            id: OrderId::new(header.try_get("id")?),
            customer_email: draft.customer_email.clone(),
            customer_name: draft.customer_name.clone(),
            phone: draft.phone.clone(),
            shipping_address: draft.shipping_address.clone(),
            total_amount: checkout.totals.total,
            payment_method: draft.payment_method.clone(),
            status: OrderStatus::Pending,
            created_at: header.try_get("created_at")?,
        };

        let mut items = Vec::with_capacity(checkout.lines.len());
        for line in &checkout.lines {
            let line_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(order.id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(&line.product_name)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.amount())
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderLine {
                id: line_id,
                order_id: order.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                price: line.unit_price,
                image_url: locked.get(&line.product_id).map(|p| p.image_url.clone()),
            });
        }

        for (product_id, quantity) in checkout.reservation.iter() {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1",
            )
            .bind(i64::from(quantity))
            .bind(product_id.as_i64())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                return Err(StoreError::Conflict(format!(
                    "stock debit for product {product_id} affected {} rows",
                    result.rows_affected()
                )));
            }
        }

        let details = OrderDetails { order, items };
        Self::enqueue(&mut tx, &Notification::order_confirmation(&details)).await?;

        tx.commit().await?;
        Ok(details)
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let order = Self::lock_order(&mut tx, order_id).await?;
        let order = Self::cancel_locked(&mut tx, order).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        policy: StatusPolicy,
    ) -> Result<StatusChange> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::lock_order(&mut tx, order_id).await?;
        let previous = order.status;
        policy.check(order_id, previous, status)?;

        if previous != status {
            if status == OrderStatus::Cancelled {
                order = Self::cancel_locked(&mut tx, order).await?;
            } else {
                sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
                    .bind(status.as_str())
                    .bind(order_id.as_i64())
                    .execute(&mut *tx)
                    .await?;
                order.status = status;
            }
        }

        tx.commit().await?;
        Ok(StatusChange { order, previous })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(&row)?;
        let items = Self::order_lines(&mut conn, order_id).await?;
        Ok(Some(OrderDetails { order, items }))
    }

    async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_email = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn payment_history(&self, email: &str) -> Result<Vec<PaymentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.created_at, o.total_amount, o.payment_method,
                   string_agg(oi.product_name, ', ' ORDER BY oi.id) AS products
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            WHERE o.user_email = $1 AND o.status <> 'Cancelled'
            GROUP BY o.id
            ORDER BY o.created_at DESC, o.id DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PaymentRecord {
                    id: OrderId::new(row.try_get("id")?),
                    created_at: row.try_get("created_at")?,
                    total_amount: Money::new(row.try_get("total_amount")?),
                    payment_method: row.try_get("payment_method")?,
                    products: row.try_get("products")?,
                })
            })
            .collect()
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(total_amount) FILTER (WHERE status = 'Delivered'), 0)::BIGINT
                    AS total_revenue,
                COUNT(*) AS total_orders,
                (SELECT COUNT(*) FROM products) AS total_products
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_orders: i64 = row.try_get("total_orders")?;
        let total_products: i64 = row.try_get("total_products")?;
        Ok(StoreStats {
            total_revenue: Money::new(row.try_get("total_revenue")?),
            total_orders: total_orders.unsigned_abs(),
            total_products: total_products.unsigned_abs(),
        })
    }
}

#[async_trait]
impl NotificationOutbox for PostgresStore {
    async fn claim_due(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxMessage>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            r#"
            UPDATE notification_outbox
            SET next_attempt_at = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE status = 'pending' AND next_attempt_at <= NOW()
                ORDER BY id
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {OUTBOX_COLUMNS}
            "#
        ))
        .bind(limit)
        .bind(lease.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        let mut claimed = rows
            .iter()
            .map(Self::row_to_outbox)
            .collect::<Result<Vec<_>>>()?;
        claimed.sort_by_key(|m| m.id);
        Ok(claimed)
    }

    async fn mark_sent(&self, id: NotificationId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET status = 'sent', attempts = attempts + 1, last_error = NULL, sent_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotificationNotFound(id));
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: NotificationId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1,
                last_error = $2,
                status = CASE WHEN $3::TIMESTAMPTZ IS NULL THEN 'failed' ELSE 'pending' END,
                next_attempt_at = COALESCE($3, next_attempt_at)
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotificationNotFound(id));
        }
        Ok(())
    }

    async fn notifications_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_outbox).collect()
    }
}
