use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId};
use domain::{
    Money, Notification, Order, OrderDetails, OrderDraft, OrderLine, OrderStatus, PaymentRecord,
    Product, ProductDraft, Reservation, StatusPolicy,
};
use tokio::sync::RwLock;

use crate::ledger::{self, LockedProduct};
use crate::{
    CatalogStore, DeliveryStatus, NotificationOutbox, OrderStore, OutboxMessage, Result,
    StatusChange, StoreError, StoreStats,
};

/// Points inside a unit of work where a test can force a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// After the order header is written, before lines and stock debits.
    AfterOrderHeader,
    /// After cancelled lines are restocked, before the status flips.
    AfterRestock,
}

#[derive(Debug, Clone, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    lines: BTreeMap<OrderId, Vec<OrderLine>>,
    outbox: BTreeMap<NotificationId, OutboxMessage>,
    last_product_id: i64,
    last_order_id: i64,
    last_line_id: i64,
    last_notification_id: i64,
    fail_point: Option<FailPoint>,
}

impl State {
    fn next_product_id(&mut self) -> ProductId {
        self.last_product_id += 1;
        ProductId::new(self.last_product_id)
    }

    fn next_order_id(&mut self) -> OrderId {
        self.last_order_id += 1;
        OrderId::new(self.last_order_id)
    }

    fn next_line_id(&mut self) -> i64 {
        self.last_line_id += 1;
        self.last_line_id
    }

    fn enqueue(&mut self, notification: Notification) {
        self.last_notification_id += 1;
        let id = NotificationId::new(self.last_notification_id);
        let now = Utc::now();
        self.outbox.insert(
            id,
            OutboxMessage {
                id,
                order_id: notification.order_id,
                kind: notification.kind,
                message: notification.message,
                status: DeliveryStatus::Pending,
                attempts: 0,
                last_error: None,
                next_attempt_at: now,
                created_at: now,
                sent_at: None,
            },
        );
    }

    /// Lines joined with the current product image.
    fn order_details(&self, order: Order) -> OrderDetails {
        let items = self
            .lines
            .get(&order.id)
            .map(|lines| {
                lines
                    .iter()
                    .cloned()
                    .map(|mut line| {
                        line.image_url = self
                            .products
                            .get(&line.product_id)
                            .map(|p| p.image_url.clone());
                        line
                    })
                    .collect()
            })
            .unwrap_or_default();
        OrderDetails { order, items }
    }

    fn order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    fn cancel(&mut self, order_id: OrderId, fail_point: Option<FailPoint>) -> Result<Order> {
        let mut order = self.order(order_id)?;
        order.status.ensure_cancellable(order_id)?;

        let reservation: Reservation = self
            .lines
            .get(&order_id)
            .into_iter()
            .flatten()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        for (product_id, quantity) in reservation.iter() {
            match self.products.get_mut(&product_id) {
                Some(product) => product.stock = product.stock.saturating_add(quantity),
                None => tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    "product no longer exists, skipping restock"
                ),
            }
        }

        if fail_point == Some(FailPoint::AfterRestock) {
            return Err(StoreError::Injected("after restock"));
        }

        order.status = OrderStatus::Cancelled;
        self.orders.insert(order_id, order.clone());
        self.enqueue(Notification::cancellation_notice(&order));
        Ok(order)
    }

    fn customer_orders<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a Order> + 'a {
        self.orders
            .values()
            .rev()
            .filter(move |o| o.customer_email == email)
    }
}

/// In-memory store for tests and single-process development.
///
/// A unit of work clones the state, mutates the copy and publishes it only
/// if every step succeeded, all under one write lock. That gives the same
/// all-or-nothing and serialized-checkout guarantees as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure for the next unit of work.
    pub async fn fail_next(&self, point: FailPoint) {
        self.state.write().await.fail_point = Some(point);
    }

    /// Sets a product's stock directly, bypassing the ledger.
    pub async fn set_stock(&self, id: ProductId, stock: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        product.stock = stock;
        Ok(())
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of outbox entries in any state.
    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    async fn transact<T>(
        &self,
        work: impl FnOnce(&mut State, Option<FailPoint>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.state.write().await;
        let fail_point = guard.fail_point.take();
        let mut staged = guard.clone();
        let value = work(&mut staged, fail_point)?;
        *guard = staged;
        Ok(value)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let mut state = self.state.write().await;
        let id = state.next_product_id();
        let product = draft.into_product(id);
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let mut state = self.state.write().await;
        let slot = state
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        *slot = draft.into_product(id);
        Ok(slot.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::ProductNotFound(id))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .rev()
            .filter(|p| match &needle {
                Some(needle) => p.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<OrderDetails> {
        self.transact(|state, fail_point| {
            let locked: BTreeMap<ProductId, LockedProduct> = draft
                .reservation()
                .iter()
                .filter_map(|(id, _)| state.products.get(&id))
                .map(|p| {
                    (
                        p.id,
                        LockedProduct {
                            id: p.id,
                            name: p.name.clone(),
                            stock: p.stock,
                            price: p.selling_price(),
                            image_url: p.image_url.clone(),
                        },
                    )
                })
                .collect();
            let checkout = ledger::price_checkout(draft, &locked)?;

            let order_id = state.next_order_id();
            let order = Order {
                id: order_id,
                customer_email: draft.customer_email.clone(),
                customer_name: draft.customer_name.clone(),
                phone: draft.phone.clone(),
                shipping_address: draft.shipping_address.clone(),
                total_amount: checkout.totals.total,
                payment_method: draft.payment_method.clone(),
                status: OrderStatus::Pending,
                created_at: Utc::now(),
            };
            state.orders.insert(order_id, order.clone());

            if fail_point == Some(FailPoint::AfterOrderHeader) {
                return Err(StoreError::Injected("after order header"));
            }

            let lines: Vec<OrderLine> = checkout
                .lines
                .iter()
                .map(|line| OrderLine {
                    id: state.next_line_id(),
                    order_id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    price: line.unit_price,
                    image_url: None,
                })
                .collect();
            state.lines.insert(order_id, lines);

            for (product_id, quantity) in checkout.reservation.iter() {
                let product = state
                    .products
                    .get_mut(&product_id)
                    .ok_or(StoreError::ProductNotFound(product_id))?;
                product.stock = product.stock.checked_sub(quantity).ok_or_else(|| {
                    StoreError::Conflict(format!("stock of product {product_id} went negative"))
                })?;
            }

            let details = state.order_details(order);
            state.enqueue(Notification::order_confirmation(&details));
            Ok(details)
        })
        .await
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        self.transact(|state, fail_point| state.cancel(order_id, fail_point))
            .await
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        policy: StatusPolicy,
    ) -> Result<StatusChange> {
        self.transact(|state, fail_point| {
            let mut order = state.order(order_id)?;
            let previous = order.status;
            policy.check(order_id, previous, status)?;
            if previous != status {
                if status == OrderStatus::Cancelled {
                    order = state.cancel(order_id, fail_point)?;
                } else {
                    order.status = status;
                    state.orders.insert(order_id, order.clone());
                }
            }
            Ok(StatusChange { order, previous })
        })
        .await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(&order_id)
            .cloned()
            .map(|order| state.order_details(order)))
    }

    async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state.customer_orders(email).cloned().collect())
    }

    async fn payment_history(&self, email: &str) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .customer_orders(email)
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| PaymentRecord {
                id: o.id,
                created_at: o.created_at,
                total_amount: o.total_amount,
                payment_method: o.payment_method.clone(),
                products: state
                    .lines
                    .get(&o.id)
                    .into_iter()
                    .flatten()
                    .map(|line| line.product_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.read().await.orders.values().rev().cloned().collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats {
            total_revenue: state
                .orders
                .values()
                .filter(|o| o.status == OrderStatus::Delivered)
                .map(|o| o.total_amount)
                .sum::<Money>(),
            total_orders: state.orders.len() as u64,
            total_products: state.products.len() as u64,
        })
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryStore {
    async fn claim_due(&self, limit: usize, lease: Duration) -> Result<Vec<OutboxMessage>> {
        let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::hours(1));
        let now = Utc::now();
        let mut state = self.state.write().await;
        let claimed: Vec<OutboxMessage> = state
            .outbox
            .values_mut()
            .filter(|m| m.status == DeliveryStatus::Pending && m.next_attempt_at <= now)
            .take(limit)
            .map(|m| {
                m.next_attempt_at = now + lease;
                m.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_sent(&self, id: NotificationId) -> Result<()> {
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .get_mut(&id)
            .ok_or(StoreError::NotificationNotFound(id))?;
        message.status = DeliveryStatus::Sent;
        message.attempts += 1;
        message.last_error = None;
        message.sent_at = Some(Utc::now());
        Ok(())
    }

    async fn record_failure(
        &self,
        id: NotificationId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let message = state
            .outbox
            .get_mut(&id)
            .ok_or(StoreError::NotificationNotFound(id))?;
        message.attempts += 1;
        message.last_error = Some(error.to_string());
        match retry_at {
            Some(at) => message.next_attempt_at = at,
            None => message.status = DeliveryStatus::Failed,
        }
        Ok(())
    }

    async fn notifications_for_order(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>> {
        Ok(self
            .state
            .read()
            .await
            .outbox
            .values()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use domain::{DomainError, DraftLine, NotificationKind};

    use super::*;

    fn product(name: &str, price: i64, stock: u32) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            brand: "N/A".to_string(),
            category: "Cricket".to_string(),
            regular_price: None,
            discount_price: Money::new(price),
            stock,
            image_url: format!("/img/{name}.png"),
            description: String::new(),
        }
    }

    fn draft(lines: &[(ProductId, u32)]) -> OrderDraft {
        OrderDraft {
            customer_email: "asha@example.com".to_string(),
            customer_name: "Asha Rao".to_string(),
            phone: "9999999999".to_string(),
            shipping_address: "1 MG Road, Bengaluru, KA - 560001".to_string(),
            payment_method: "COD".to_string(),
            lines: lines
                .iter()
                .map(|(product_id, quantity)| DraftLine {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    async fn stock_of(store: &InMemoryStore, id: ProductId) -> u32 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_place_order_debits_stock_and_enqueues_confirmation() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();

        let details = store.place_order(&draft(&[(bat.id, 2)])).await.unwrap();

        assert_eq!(details.order.total_amount, Money::new(3050));
        assert_eq!(details.items[0].image_url.as_deref(), Some("/img/Bat.png"));
        assert_eq!(stock_of(&store, bat.id).await, 3);

        let outbox = store.notifications_for_order(details.order.id).await.unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].kind, NotificationKind::OrderConfirmation);
    }

    #[tokio::test]
    async fn test_overflowing_total_is_rejected_without_writes() {
        let store = InMemoryStore::new();
        let gold = store
            .create_product(product("Gold", 4_000_000_000_000_000_000, 5))
            .await
            .unwrap();

        let err = store.place_order(&draft(&[(gold.id, 3)])).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Domain(DomainError::AmountOverflow)
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.outbox_len().await, 0);
        assert_eq!(stock_of(&store, gold.id).await, 5);
    }

    #[tokio::test]
    async fn test_fail_point_rolls_back_whole_checkout() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();

        store.fail_next(FailPoint::AfterOrderHeader).await;
        let result = store.place_order(&draft(&[(bat.id, 2)])).await;

        assert!(matches!(result, Err(StoreError::Injected(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.outbox_len().await, 0);
        assert_eq!(stock_of(&store, bat.id).await, 5);

        // one-shot: the next checkout goes through
        assert!(store.place_order(&draft(&[(bat.id, 2)])).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_restocks_and_rejects_second_cancel() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();
        let order = store.place_order(&draft(&[(bat.id, 2)])).await.unwrap().order;

        let cancelled = store.cancel_order(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, bat.id).await, 5);

        let err = store.cancel_order(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(stock_of(&store, bat.id).await, 5);
    }

    #[tokio::test]
    async fn test_cancel_fail_point_keeps_stock_debited() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();
        let order = store.place_order(&draft(&[(bat.id, 2)])).await.unwrap().order;

        store.fail_next(FailPoint::AfterRestock).await;
        assert!(store.cancel_order(order.id).await.is_err());

        assert_eq!(stock_of(&store, bat.id).await, 3);
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_skips_deleted_products() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();
        let ball = store.create_product(product("Ball", 200, 5)).await.unwrap();
        let order = store
            .place_order(&draft(&[(bat.id, 1), (ball.id, 1)]))
            .await
            .unwrap()
            .order;

        store.delete_product(bat.id).await.unwrap();
        store.cancel_order(order.id).await.unwrap();

        assert_eq!(stock_of(&store, ball.id).await, 5);
        let details = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(details.items[0].product_name, "Bat");
        assert!(details.items[0].image_url.is_none());
    }

    #[tokio::test]
    async fn test_list_products_filters_by_name() {
        let store = InMemoryStore::new();
        store.create_product(product("Cricket Bat", 1500, 5)).await.unwrap();
        store.create_product(product("Tennis Ball", 200, 5)).await.unwrap();

        let found = store.list_products(Some("bat")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Cricket Bat");
        assert_eq!(store.list_products(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_claim_hides_messages_for_the_lease() {
        let store = InMemoryStore::new();
        let bat = store.create_product(product("Bat", 1500, 5)).await.unwrap();
        store.place_order(&draft(&[(bat.id, 1)])).await.unwrap();

        let first = store.claim_due(10, Duration::from_secs(60)).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = store.claim_due(10, Duration::from_secs(60)).await.unwrap();
        assert!(second.is_empty());
    }
}
