//! Transactional email rendering.
//!
//! Messages are rendered when the order change is committed and stored in
//! the outbox as-is, so delivery retries always send what the customer's
//! order looked like at that moment.

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderDetails};

/// What an outbound notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation,
    OrderCancellation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderConfirmation => "order_confirmation",
            NotificationKind::OrderCancellation => "order_cancellation",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_confirmation" => Ok(NotificationKind::OrderConfirmation),
            "order_cancellation" => Ok(NotificationKind::OrderCancellation),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// A rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// An email tied to the order change that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub message: EmailMessage,
}

impl Notification {
    /// Confirmation sent after a successful checkout.
    pub fn order_confirmation(details: &OrderDetails) -> Self {
        let order = &details.order;
        let rows: String = details
            .items
            .iter()
            .map(|item| {
                format!(
                    "<tr><td>{} (x{})</td><td>{}</td></tr>",
                    escape_html(&item.product_name),
                    item.quantity,
                    item.line_total()
                )
            })
            .collect();

        let html = format!(
            "<h1>Thank You For Your Order!</h1>\
             <p>Your order #{id} has been placed successfully.</p>\
             <h3>Order Summary:</h3>\
             <table border=\"1\" cellpadding=\"5\" cellspacing=\"0\">\
             <thead><tr><th>Product</th><th>Price</th></tr></thead>\
             <tbody>{rows}</tbody></table>\
             <h4>Total: {total}</h4>\
             <p>Shipping to: {address}</p>",
            id = order.id,
            total = order.total_amount,
            address = escape_html(&order.shipping_address),
        );

        Self {
            order_id: order.id,
            kind: NotificationKind::OrderConfirmation,
            message: EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Order Confirmation #{}", order.id),
                html,
            },
        }
    }

    /// Notice sent after a cancellation has been committed.
    pub fn cancellation_notice(order: &Order) -> Self {
        let html = format!(
            "<h1>Your Order #{id} has been cancelled.</h1>\
             <p>We're sorry to see you go. The items from your order have been restocked. \
             If you have any questions, please contact our support. \
             If you have already paid, a refund will be processed within 3-5 business days.</p>",
            id = order.id
        );

        Self {
            order_id: order.id,
            kind: NotificationKind::OrderCancellation,
            message: EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Order Cancelled: #{}", order.id),
                html,
            },
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
