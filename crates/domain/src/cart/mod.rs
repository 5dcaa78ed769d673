//! Session-scoped shopping carts.
//!
//! A cart belongs either to an anonymous browser session or to a signed-in
//! user. On login the guest cart is folded into the user's cart with
//! [`CartService::merge_carts`].

mod service;
mod storage;

pub use service::CartService;
pub use storage::{CartStorage, InMemoryCartStorage};

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::order::OrderTotals;
use crate::product::Product;

/// Most units of one product a cart line can hold.
pub const MAX_ITEM_QUANTITY: u32 = 1_000;

/// Errors raised by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity outside `0..=MAX_ITEM_QUANTITY` (or `1..` when adding).
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Cart owner id is empty.
    #[error("Cart owner id is required")]
    MissingOwner,

    /// The backing storage failed.
    #[error("Cart storage error: {0}")]
    Storage(String),
}

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartOwner {
    /// Anonymous browser session.
    Guest(String),
    /// Signed-in user, keyed by email.
    User(String),
}

impl CartOwner {
    /// Builds an owner from a route segment pair (`guest`/`user`, id).
    pub fn parse(kind: &str, id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        match kind {
            "guest" => Some(CartOwner::Guest(id.to_string())),
            "user" => Some(CartOwner::User(id.to_ascii_lowercase())),
            _ => None,
        }
    }

    /// Storage key, e.g. `guest:3f2a` or `user:asha@example.com`.
    pub fn key(&self) -> String {
        match self {
            CartOwner::Guest(id) => format!("guest:{id}"),
            CartOwner::User(email) => format!("user:{email}"),
        }
    }
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// A product in a cart, with the display data captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image_url: String,
    pub quantity: u32,
}

impl CartItem {
    /// A single unit of `product`.
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            price: product.selling_price(),
            image_url: product.image_url.clone(),
            quantity: 1,
        }
    }
}

/// Items in insertion order; at most one entry per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Priced like a checkout of the same items. Checkout re-prices from
    /// the catalog, so this is an estimate.
    pub fn totals(&self) -> OrderTotals {
        OrderTotals::from_subtotal(self.items.iter().map(|i| i.price.multiply(i.quantity)).sum())
    }

    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds `item`; an existing entry for the same product gains its quantity.
    /// Line quantities are capped at [`MAX_ITEM_QUANTITY`].
    pub fn add(&mut self, mut item: CartItem) {
        match self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .saturating_add(item.quantity)
                    .min(MAX_ITEM_QUANTITY);
            }
            None => {
                item.quantity = item.quantity.min(MAX_ITEM_QUANTITY);
                self.items.push(item);
            }
        }
    }

    /// Sets the quantity of an item; zero removes it. Returns false if the
    /// product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(existing) => {
                existing.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes a product. Returns false if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    /// Folds another cart into this one.
    pub fn merge(&mut self, other: Cart) {
        for item in other.items {
            self.add(item);
        }
    }
}
