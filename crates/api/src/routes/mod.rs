//! HTTP handlers and the shared application state.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use std::str::FromStr;

use domain::{CartService, CartStorage};
use ::orders::OrderService;
use store::Storefront;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Storefront, C: CartStorage> {
    pub order_service: OrderService<S>,
    pub cart_service: CartService<C>,
}

impl<S: Storefront, C: CartStorage> AppState<S, C> {
    /// The backing store, for catalog reads and admin queries.
    pub fn store(&self) -> &S {
        self.order_service.store()
    }
}

/// Parses a numeric id from a path segment.
fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}
