//! Order service error types.

use common::{OrderId, ProductId};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by [`crate::OrderService`].
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// A business rule rejected the request. Nothing was written.
    #[error(transparent)]
    Domain(DomainError),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The store failed; the unit of work was rolled back.
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<DomainError> for OrderServiceError {
    fn from(e: DomainError) -> Self {
        OrderServiceError::Domain(e)
    }
}

impl From<StoreError> for OrderServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Domain(e) => OrderServiceError::Domain(e),
            StoreError::OrderNotFound(id) => OrderServiceError::OrderNotFound(id),
            StoreError::ProductNotFound(id) => OrderServiceError::ProductNotFound(id),
            other => OrderServiceError::Storage(other),
        }
    }
}

/// Convenience type alias for order service results.
pub type Result<T> = std::result::Result<T, OrderServiceError>;
