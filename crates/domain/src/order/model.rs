//! Persisted order records and their read shapes.
//!
//! Field names on the wire follow the storefront's column names
//! (`user_email`, `total_amount`, `imageUrl`, ...).

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::status::OrderStatus;

/// A line priced from the catalog inside the checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    /// Name snapshot, immune to later renames.
    pub product_name: String,
    pub quantity: u32,
    /// Price snapshot, immune to later price changes.
    pub unit_price: Money,
}

impl PricedLine {
    /// `None` when the product of price and quantity overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "user_email")]
    pub customer_email: String,
    pub customer_name: String,
    #[serde(rename = "user_phone")]
    pub phone: String,
    pub shipping_address: String,
    pub total_amount: Money,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A stored line item, optionally joined with the product's current image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
    /// Soft join for display. `None` once the product is deleted.
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// Header plus line items, as returned by `GET /api/orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl OrderDetails {
    /// Sum of line totals, without shipping.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderLine::line_total).sum()
    }
}

/// A non-cancelled order summarized for the payment history page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub total_amount: Money,
    pub payment_method: String,
    /// Comma-separated product name snapshots.
    pub products: String,
}
