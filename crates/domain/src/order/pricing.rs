//! Order pricing: subtotal plus the flat shipping fee.

use serde::Serialize;

use crate::error::DomainError;
use crate::money::Money;
use crate::order::model::PricedLine;

/// Subtotals strictly above this ship free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::new(5000);

/// Shipping fee charged at or below the threshold.
pub const FLAT_SHIPPING_FEE: Money = Money::new(50);

/// Returns the shipping fee for a subtotal.
pub fn shipping_fee(subtotal: Money) -> Money {
    if subtotal > FREE_SHIPPING_THRESHOLD {
        Money::zero()
    } else {
        FLAT_SHIPPING_FEE
    }
}

/// Subtotal, fee and grand total of a set of priced lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Prices an already-computed subtotal.
    pub fn from_subtotal(subtotal: Money) -> Self {
        let fee = shipping_fee(subtotal);
        Self {
            subtotal,
            shipping_fee: fee,
            total: subtotal + fee,
        }
    }

    /// Σ(unit price × quantity) + shipping fee, or
    /// [`DomainError::AmountOverflow`] if any step leaves the `i64` range.
    pub fn for_lines<'a>(
        lines: impl IntoIterator<Item = &'a PricedLine>,
    ) -> Result<Self, DomainError> {
        let subtotal = lines
            .into_iter()
            .try_fold(Money::zero(), |acc, line| {
                line.line_total().and_then(|total| acc.checked_add(total))
            })
            .ok_or(DomainError::AmountOverflow)?;
        let fee = shipping_fee(subtotal);
        let total = subtotal
            .checked_add(fee)
            .ok_or(DomainError::AmountOverflow)?;

        Ok(Self {
            subtotal,
            shipping_fee: fee,
            total,
        })
    }
}
