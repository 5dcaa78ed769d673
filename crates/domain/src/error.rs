//! Domain error types.

use common::{OrderId, ProductId};
use thiserror::Error;

use crate::order::OrderStatus;

/// Business-rule failures. Every variant is detected before any mutation
/// becomes visible to other units of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A product cannot cover the requested quantity.
    #[error(
        "Sorry, we don't have enough stock for {product_name}. Available: {available}, Requested: {requested}."
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
        requested: u32,
    },

    /// The order's current status does not allow the requested change.
    #[error("{}", describe_transition(*.order_id, *.current, *.requested))]
    InvalidTransition {
        order_id: OrderId,
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// A checkout referenced a product that is not in the catalog.
    #[error("Product {0} not found")]
    UnknownProduct(ProductId),

    /// Checkout without any line items.
    #[error("Your order has no items")]
    EmptyOrder,

    /// Line item quantity outside `1..=u32::MAX`.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A required request field is empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Status string outside the order status enum.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// An order total does not fit the money type.
    #[error("Order total is too large")]
    AmountOverflow,

    /// Admin product input failed validation.
    #[error("{0}")]
    InvalidProduct(String),
}

fn describe_transition(order_id: OrderId, current: OrderStatus, requested: OrderStatus) -> String {
    if requested == OrderStatus::Cancelled {
        format!("Cannot cancel an order that is already {current}.")
    } else {
        format!("Cannot change order #{order_id} from {current} to {requested}.")
    }
}
