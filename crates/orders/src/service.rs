use std::sync::Arc;
use std::time::Instant;

use common::OrderId;
use domain::{
    CheckoutRequest, DomainError, Order, OrderDetails, OrderStatus, PaymentRecord, StatusPolicy,
};
use store::OrderStore;
use tokio::sync::Notify;

use crate::error::{OrderServiceError, Result};

/// Service for placing, cancelling and advancing orders.
///
/// Every mutating call is a single unit of work in the store, including
/// the outbox entry for the customer email. The email itself is sent later
/// by the dispatcher, which this service wakes through `dispatcher_wake`.
pub struct OrderService<S: OrderStore> {
    store: S,
    policy: StatusPolicy,
    dispatcher_wake: Option<Arc<Notify>>,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service with the permissive status policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: StatusPolicy::default(),
            dispatcher_wake: None,
        }
    }

    /// Sets the policy for admin status changes.
    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wakes `notify` whenever an email is queued.
    pub fn with_dispatcher_wake(mut self, notify: Arc<Notify>) -> Self {
        self.dispatcher_wake = Some(notify);
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Places an order.
    ///
    /// Validates the request, then checks and debits stock, writes the
    /// order and queues the confirmation email atomically.
    #[tracing::instrument(skip(self, request), fields(email = %request.user_details.email))]
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<OrderDetails> {
        let started = Instant::now();

        let result = match request.into_draft() {
            Ok(draft) => self.store.place_order(&draft).await.map_err(Into::into),
            Err(e) => Err(OrderServiceError::Domain(e)),
        };

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(details) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %details.order.id,
                    total = %details.order.total_amount,
                    lines = details.items.len(),
                    "order placed"
                );
                self.wake_dispatcher();
                Ok(details)
            }
            Err(e) => {
                let reason = rejection_reason(&e);
                metrics::counter!("order_placement_rejected_total", "reason" => reason)
                    .increment(1);
                match &e {
                    OrderServiceError::Storage(inner) => {
                        tracing::error!(error = %inner, "order placement failed")
                    }
                    other => tracing::info!(reason, error = %other, "order rejected"),
                }
                Err(e)
            }
        }
    }

    /// Loads an order with its line items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(OrderServiceError::OrderNotFound(order_id))
    }

    /// Cancels an order and restocks its lines.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self.store.cancel_order(order_id).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %order_id, "order cancelled");
        self.wake_dispatcher();
        Ok(order)
    }

    /// Applies an admin status change under the configured policy.
    ///
    /// Setting `Cancelled` runs the cancellation workflow. Setting the
    /// order's current status succeeds without side effects.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let change = self
            .store
            .update_order_status(order_id, status, self.policy)
            .await?;

        if !change.changed() {
            tracing::debug!(order_id = %order_id, status = %status, "order status unchanged");
            return Ok(change.order);
        }

        metrics::counter!("order_status_changes_total", "status" => status.as_str()).increment(1);
        tracing::info!(
            order_id = %order_id,
            from = %change.previous,
            to = %status,
            "order status updated"
        );
        if status == OrderStatus::Cancelled {
            metrics::counter!("orders_cancelled_total").increment(1);
            self.wake_dispatcher();
        }
        Ok(change.order)
    }

    /// Parses a status name and applies it.
    pub async fn update_status_str(&self, order_id: OrderId, status: &str) -> Result<Order> {
        let status = status.parse::<OrderStatus>()?;
        self.update_status(order_id, status).await
    }

    /// Lists a customer's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_customer(&self, email: &str) -> Result<Vec<Order>> {
        let email = required_email(email)?;
        Ok(self.store.orders_for_customer(email).await?)
    }

    /// Lists a customer's non-cancelled orders.
    #[tracing::instrument(skip(self))]
    pub async fn payment_history(&self, email: &str) -> Result<Vec<PaymentRecord>> {
        let email = required_email(email)?;
        Ok(self.store.payment_history(email).await?)
    }

    /// Lists every order, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    fn wake_dispatcher(&self) {
        if let Some(notify) = &self.dispatcher_wake {
            notify.notify_one();
        }
    }
}

fn required_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::MissingField("Email").into());
    }
    Ok(email)
}

fn rejection_reason(err: &OrderServiceError) -> &'static str {
    match err {
        OrderServiceError::Domain(DomainError::InsufficientStock { .. }) => "insufficient_stock",
        OrderServiceError::Domain(DomainError::UnknownProduct(_))
        | OrderServiceError::ProductNotFound(_) => "unknown_product",
        OrderServiceError::Domain(_) => "invalid_request",
        OrderServiceError::OrderNotFound(_) | OrderServiceError::Storage(_) => "storage",
    }
}
