//! Catalog product types.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Highest price the back office accepts for a single unit.
pub const MAX_UNIT_PRICE: i64 = 10_000_000;

/// A catalog product. Stock is only changed by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub regular_price: Option<Money>,
    pub discount_price: Money,
    pub stock: u32,
    pub image_url: String,
    pub description: String,
}

impl Product {
    /// The price a checkout snapshots into the order line.
    pub fn selling_price(&self) -> Money {
        self.discount_price
    }
}

/// Admin create/update payload, as sent by the back-office form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub regular_price: Option<i64>,
    pub discount_price: Option<i64>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// Validated product fields, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub regular_price: Option<Money>,
    pub discount_price: Money,
    pub stock: u32,
    pub image_url: String,
    pub description: String,
}

impl ProductDraft {
    /// Materializes the draft under an assigned id.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            brand: self.brand,
            category: self.category,
            regular_price: self.regular_price,
            discount_price: self.discount_price,
            stock: self.stock,
            image_url: self.image_url,
            description: self.description,
        }
    }
}

impl ProductInput {
    /// Validates the payload and fills in back-office defaults.
    pub fn validate(self) -> Result<ProductDraft, DomainError> {
        let name = non_empty(self.name);
        let category = non_empty(self.category);
        let image_url = non_empty(self.image_url);
        let discount_price = self.discount_price.filter(|p| *p > 0);

        let (Some(name), Some(discount_price), Some(category), Some(image_url)) =
            (name, discount_price, category, image_url)
        else {
            return Err(DomainError::InvalidProduct(
                "Name, Discount Price, Category, and Image URL are required.".to_string(),
            ));
        };

        if self.regular_price.is_some_and(|p| p < 0) {
            return Err(DomainError::InvalidProduct(
                "Regular Price cannot be negative.".to_string(),
            ));
        }
        if discount_price > MAX_UNIT_PRICE
            || self.regular_price.is_some_and(|p| p > MAX_UNIT_PRICE)
        {
            return Err(DomainError::InvalidProduct(format!(
                "Prices cannot exceed {}.",
                Money::new(MAX_UNIT_PRICE)
            )));
        }

        let stock = match self.stock {
            None => 0,
            Some(s) => u32::try_from(s).map_err(|_| {
                DomainError::InvalidProduct(format!("Stock must be a non-negative integer, got {s}."))
            })?,
        };

        Ok(ProductDraft {
            name,
            brand: non_empty(self.brand).unwrap_or_else(|| "N/A".to_string()),
            category,
            regular_price: self.regular_price.filter(|p| *p > 0).map(Money::new),
            discount_price: Money::new(discount_price),
            stock,
            image_url,
            description: self.description.unwrap_or_default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
