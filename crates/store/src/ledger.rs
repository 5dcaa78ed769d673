//! Checkout pricing over locked product rows, shared by both stores.

use std::collections::BTreeMap;

use common::ProductId;
use domain::{
    Money, OrderDraft, OrderTotals, PricedLine, Reservation, StockLevel, check_reservation,
};

use crate::Result;

/// A product row as seen under its checkout lock.
#[derive(Debug, Clone)]
pub(crate) struct LockedProduct {
    pub id: ProductId,
    pub name: String,
    pub stock: u32,
    pub price: Money,
    pub image_url: String,
}

/// The outcome of a successful stock check.
#[derive(Debug)]
pub(crate) struct Checkout {
    pub reservation: Reservation,
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

/// Checks the draft's reservation against the locked rows and prices each
/// line from the catalog.
///
/// Lines keep the order the customer sent them in.
pub(crate) fn price_checkout(
    draft: &OrderDraft,
    locked: &BTreeMap<ProductId, LockedProduct>,
) -> Result<Checkout> {
    let reservation = draft.reservation();
    let levels: BTreeMap<ProductId, StockLevel> = locked
        .values()
        .map(|p| {
            (
                p.id,
                StockLevel {
                    product_id: p.id,
                    product_name: p.name.clone(),
                    available: p.stock,
                },
            )
        })
        .collect();
    check_reservation(&reservation, &levels)?;

    let lines: Vec<PricedLine> = draft
        .lines
        .iter()
        .filter_map(|line| {
            locked.get(&line.product_id).map(|p| PricedLine {
                product_id: p.id,
                product_name: p.name.clone(),
                quantity: line.quantity,
                unit_price: p.price,
            })
        })
        .collect();
    let totals = OrderTotals::for_lines(&lines)?;

    Ok(Checkout {
        reservation,
        lines,
        totals,
    })
}
