use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId};
use domain::{
    Money, Order, OrderDetails, OrderDraft, OrderStatus, PaymentRecord, Product, ProductDraft,
    StatusPolicy,
};
use serde::Serialize;

use crate::{OutboxMessage, Result};

/// Product catalog reads and admin writes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a product and returns it with its assigned id.
    async fn create_product(&self, draft: ProductDraft) -> Result<Product>;

    /// Replaces every field of an existing product.
    ///
    /// Fails with `ProductNotFound` if the id is unknown.
    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product>;

    /// Deletes a product. Order lines that reference it keep their snapshots.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products, newest first, optionally filtered by a
    /// case-insensitive substring of the name.
    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>>;
}

/// Order lifecycle storage.
///
/// Implementations must serialize competing checkouts on the product rows
/// they touch so that stock never goes negative, and must make each
/// mutating operation all-or-nothing together with its outbox entry.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Checks and debits stock, writes the order and its lines, and
    /// enqueues the confirmation email in one unit of work.
    ///
    /// Prices and names are snapshotted from the catalog, never taken from
    /// the client. Fails with `InsufficientStock` or `UnknownProduct` without
    /// writing anything.
    async fn place_order(&self, draft: &OrderDraft) -> Result<OrderDetails>;

    /// Restocks every line, marks the order `Cancelled` and enqueues the
    /// cancellation email in one unit of work.
    ///
    /// Delivered and already cancelled orders fail with `InvalidTransition`
    /// and leave stock untouched.
    async fn cancel_order(&self, order_id: OrderId) -> Result<Order>;

    /// Applies an admin status change under `policy`.
    ///
    /// Requesting `Cancelled` runs the full cancellation so stock is
    /// returned. Requesting the current status writes nothing.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        policy: StatusPolicy,
    ) -> Result<StatusChange>;

    /// Returns the header and lines of an order, lines in insertion order.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>>;

    /// Lists a customer's orders, newest first.
    async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>>;

    /// Lists a customer's non-cancelled orders with their product names.
    async fn payment_history(&self, email: &str) -> Result<Vec<PaymentRecord>>;

    /// Lists every order, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Dashboard counters.
    async fn stats(&self) -> Result<StoreStats>;
}

/// Durable queue of rendered order emails.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Claims up to `limit` pending messages whose retry time has passed.
    ///
    /// Claimed messages are hidden from other claimers for `lease`, so a
    /// crashed dispatcher's claims become visible again once it expires.
    async fn claim_due(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxMessage>>;

    /// Marks a message as delivered.
    async fn mark_sent(&self, id: NotificationId) -> Result<()>;

    /// Records a failed delivery attempt.
    ///
    /// With `retry_at` set the message stays pending until then; without it
    /// the message is parked as failed and never retried.
    async fn record_failure(
        &self,
        id: NotificationId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Returns every message enqueued for an order, oldest first.
    async fn notifications_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>>;
}

/// The result of an admin status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order: Order,
    /// Status the order had when the update locked it.
    pub previous: OrderStatus,
}

impl StatusChange {
    /// False when the order already had the requested status.
    pub fn changed(&self) -> bool {
        self.previous != self.order.status
    }
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Sum of `total_amount` over delivered orders.
    pub total_revenue: Money,
    pub total_orders: u64,
    pub total_products: u64,
}

/// Everything the storefront needs from one backing store.
pub trait Storefront: CatalogStore + OrderStore + NotificationOutbox + Clone + 'static {}

impl<T> Storefront for T where T: CatalogStore + OrderStore + NotificationOutbox + Clone + 'static {}
