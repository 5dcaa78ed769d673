//! Checkout request validation.

use common::ProductId;
use serde::Deserialize;

use crate::error::DomainError;
use crate::inventory::Reservation;

/// The body of `POST /api/place-order`.
///
/// Any `name`/`price` the client sends with an item is display data only
/// and is ignored: line names and prices are snapshotted from the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_details: CustomerDetails,
    pub shipping_address: ShippingAddress,
    pub order_items: Vec<RequestedItem>,
    #[serde(default)]
    pub payment_method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
}

impl ShippingAddress {
    /// Flattens the address into the single string stored on the order.
    pub fn flatten(&self) -> String {
        format!(
            "{}, {}, {} - {}",
            self.address.trim(),
            self.city.trim(),
            self.state.trim(),
            self.pincode.trim()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub id: ProductId,
    pub quantity: i64,
}

/// A product/quantity pair of a validated checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A validated checkout, not yet priced or persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer_email: String,
    pub customer_name: String,
    pub phone: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub lines: Vec<DraftLine>,
}

impl OrderDraft {
    /// The stock this order needs, summed per product.
    pub fn reservation(&self) -> Reservation {
        self.lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }
}

impl CheckoutRequest {
    /// Validates the request into an [`OrderDraft`].
    pub fn into_draft(self) -> Result<OrderDraft, DomainError> {
        let email = self.user_details.email.trim();
        if email.is_empty() {
            return Err(DomainError::MissingField("Email"));
        }
        let customer_name = format!(
            "{} {}",
            self.user_details.first_name.trim(),
            self.user_details.last_name.trim()
        )
        .trim()
        .to_string();
        if customer_name.is_empty() {
            return Err(DomainError::MissingField("Customer name"));
        }
        if self.shipping_address.address.trim().is_empty() {
            return Err(DomainError::MissingField("Shipping address"));
        }
        if self.order_items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }

        let lines = self
            .order_items
            .iter()
            .map(|item| {
                u32::try_from(item.quantity)
                    .ok()
                    .filter(|q| *q > 0)
                    .map(|quantity| DraftLine {
                        product_id: item.id,
                        quantity,
                    })
                    .ok_or(DomainError::InvalidQuantity {
                        product_id: item.id,
                        quantity: item.quantity,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let payment_method = match self.payment_method.trim() {
            "" => "COD".to_string(),
            method => method.to_string(),
        };

        Ok(OrderDraft {
            customer_email: email.to_string(),
            customer_name,
            phone: self.user_details.phone.trim().to_string(),
            shipping_address: self.shipping_address.flatten(),
            payment_method,
            lines,
        })
    }
}
