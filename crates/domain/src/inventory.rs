//! Inventory ledger rules shared by every store implementation.
//!
//! Stores lock the product rows named by a [`Reservation`], load a
//! [`StockLevel`] for each, and call [`check_reservation`] before debiting
//! anything. The check is all-or-nothing: a single shortfall rejects the
//! whole reservation.

use std::collections::BTreeMap;

use common::ProductId;

use crate::error::DomainError;

/// Requested quantities per product.
///
/// Lines for the same product are summed, and iteration is in ascending
/// product id order, which is also the row-lock order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservation {
    quantities: BTreeMap<ProductId, u32>,
}

impl Reservation {
    /// Creates an empty reservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a quantity for a product.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) {
        let entry = self.quantities.entry(product_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Returns the requested quantity for a product (0 if absent).
    pub fn quantity(&self, product_id: ProductId) -> u32 {
        self.quantities.get(&product_id).copied().unwrap_or(0)
    }

    /// Product ids in lock order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.quantities.keys().copied().collect()
    }

    /// Iterates `(product, quantity)` in lock order.
    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.quantities.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }
}

impl FromIterator<(ProductId, u32)> for Reservation {
    fn from_iter<T: IntoIterator<Item = (ProductId, u32)>>(iter: T) -> Self {
        let mut reservation = Reservation::new();
        for (product_id, quantity) in iter {
            reservation.add(product_id, quantity);
        }
        reservation
    }
}

/// Current stock of a locked product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub product_name: String,
    pub available: u32,
}

impl StockLevel {
    /// Fails with `InsufficientStock` if `requested` exceeds availability.
    pub fn ensure_covers(&self, requested: u32) -> Result<(), DomainError> {
        if self.available < requested {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id,
                product_name: self.product_name.clone(),
                available: self.available,
                requested,
            });
        }
        Ok(())
    }
}

/// Checks a whole reservation against the locked stock levels.
///
/// Returns the first failure in product id order: `UnknownProduct` if a
/// product has no row, `InsufficientStock` if it cannot cover the request.
pub fn check_reservation(
    reservation: &Reservation,
    levels: &BTreeMap<ProductId, StockLevel>,
) -> Result<(), DomainError> {
    for (product_id, requested) in reservation.iter() {
        let level = levels
            .get(&product_id)
            .ok_or(DomainError::UnknownProduct(product_id))?;
        level.ensure_covers(requested)?;
    }
    Ok(())
}
